use alloy_primitives::Bytes;
use async_trait::async_trait;
use rollup_attestation_client::{AttestationClient, ProofParams};
use rollup_prover_types::{TIER_SGX_ID, TierId};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use super::{ProofContext, ProofProducer, dummy_proof};
use crate::{
    error::ProducerError,
    retry::{RetryError, RetryPolicy, retry},
};

/// Endpoints the attestation host reads block data from.
#[derive(Debug, Clone)]
pub struct SgxProducerConfig {
    pub l1_endpoint: Url,
    pub l1_beacon_endpoint: Option<Url>,
    pub l2_endpoint: Url,
}

/// Producer of the SGX tier, backed by a remote attestation host.
///
/// Unreachable hosts are retried under the producer's policy. Errors reported by the
/// host itself are terminal.
#[derive(Debug, Clone)]
pub struct SgxProducer {
    client: Option<AttestationClient>,
    config: SgxProducerConfig,
    retry: RetryPolicy,
}

impl SgxProducer {
    /// Creates a producer calling the attestation host at `client`.
    pub fn new(client: AttestationClient, config: SgxProducerConfig, retry: RetryPolicy) -> Self {
        Self {
            client: Some(client),
            config,
            retry,
        }
    }

    /// Creates a producer returning dummy proofs without network access.
    pub fn dummy(config: SgxProducerConfig, retry: RetryPolicy) -> Self {
        Self {
            client: None,
            config,
            retry,
        }
    }

    fn params(&self, ctx: &ProofContext) -> ProofParams {
        ProofParams::sgx(
            ctx.block_id,
            self.config.l1_endpoint.to_string(),
            self.config
                .l1_beacon_endpoint
                .as_ref()
                .map(Url::to_string)
                .unwrap_or_default(),
            self.config.l2_endpoint.to_string(),
            ctx.prover,
            ctx.graffiti,
        )
    }
}

#[async_trait]
impl ProofProducer for SgxProducer {
    fn tier(&self) -> TierId {
        TIER_SGX_ID
    }

    async fn produce(
        &self,
        ctx: &ProofContext,
        shutdown_token: &CancellationToken,
    ) -> Result<Bytes, ProducerError> {
        let Some(client) = &self.client else {
            info!(block_id = ctx.block_id, "Dummy SGX proof generated");
            return Ok(dummy_proof());
        };

        let params = self.params(ctx);
        info!(block_id = ctx.block_id, host = %client.url(), "Requesting SGX proof");

        match retry(&self.retry, shutdown_token, "sgx proof", || {
            client.request_proof(&params)
        })
        .await
        {
            Ok(proof) => {
                info!(block_id = ctx.block_id, proof_len = proof.len(), "SGX proof generated");
                Ok(proof)
            }
            Err(RetryError::Cancelled) => Err(ProducerError::Cancelled),
            Err(RetryError::Exhausted { attempts, last }) => {
                warn!(block_id = ctx.block_id, attempts, error = %last, "Attestation host unreachable");
                Err(ProducerError::Transport {
                    attempts,
                    source: last,
                })
            }
            Err(RetryError::Terminal(e)) => Err(ProducerError::Attestation(e)),
        }
    }
}
