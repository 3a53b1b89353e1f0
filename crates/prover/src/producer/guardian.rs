use alloy_primitives::{Bytes, keccak256};
use async_trait::async_trait;
use rollup_prover_types::{TIER_GUARDIAN_ID, TierId};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ProofContext, ProofProducer, dummy_proof};
use crate::error::ProducerError;

/// Proof telling the protocol to return the liveness bond to the assigned prover.
pub fn liveness_bond_proof() -> Bytes {
    Bytes::from(keccak256("RETURN_LIVENESS_BOND").to_vec())
}

/// Producer of the guardian tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardianProducer {
    enable_liveness_bond_proof: bool,
}

impl GuardianProducer {
    pub fn new(enable_liveness_bond_proof: bool) -> Self {
        Self {
            enable_liveness_bond_proof,
        }
    }
}

#[async_trait]
impl ProofProducer for GuardianProducer {
    fn tier(&self) -> TierId {
        TIER_GUARDIAN_ID
    }

    async fn produce(
        &self,
        ctx: &ProofContext,
        _shutdown_token: &CancellationToken,
    ) -> Result<Bytes, ProducerError> {
        if self.enable_liveness_bond_proof {
            debug!(block_id = ctx.block_id, "Guardian proof with liveness bond return");
            return Ok(liveness_bond_proof());
        }
        Ok(dummy_proof())
    }
}
