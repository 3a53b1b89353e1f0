//! Per-tier proof submission pipeline.

use std::{fmt, sync::Arc};

use alloy_primitives::{Address, B256};
use rollup_prover_types::{GeneratedProof, ProofRequest, TierId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    error::{Error, ProducerError, Result},
    producer::{ProofContext, ProofProducer},
    rpc::ProverRpc,
    sender::{TxReceipt, TxSender, send_and_confirm},
    tracker::{BlockState, BlockTracker},
    tx_builder::TxBuilder,
};

/// Drives one tier's producer and submits its proofs.
///
/// A request runs its stages strictly in order: read the L2 header, produce the proof,
/// build the transaction, send it, wait for confirmation. No transaction is built
/// when the producer fails.
#[derive(Clone)]
pub struct ProofSubmitter {
    rpc: Arc<dyn ProverRpc>,
    producer: Arc<dyn ProofProducer>,
    sender: Arc<dyn TxSender>,
    builder: Arc<dyn TxBuilder>,
    tracker: Arc<BlockTracker>,
    prover: Address,
    graffiti: B256,
}

impl fmt::Debug for ProofSubmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProofSubmitter")
            .field("producer", &self.producer)
            .field("prover", &self.prover)
            .finish_non_exhaustive()
    }
}

impl ProofSubmitter {
    pub fn new(
        rpc: Arc<dyn ProverRpc>,
        producer: Arc<dyn ProofProducer>,
        sender: Arc<dyn TxSender>,
        builder: Arc<dyn TxBuilder>,
        tracker: Arc<BlockTracker>,
        prover: Address,
        graffiti: B256,
    ) -> Self {
        Self {
            rpc,
            producer,
            sender,
            builder,
            tracker,
            prover,
            graffiti,
        }
    }

    /// Tier this submitter proves.
    pub fn tier(&self) -> TierId {
        self.producer.tier()
    }

    /// Generates and submits the proof requested by `request`.
    pub async fn submit(
        &self,
        request: ProofRequest,
        shutdown_token: &CancellationToken,
    ) -> Result<TxReceipt> {
        let ProofRequest {
            block_id,
            tier,
            meta,
        } = request;

        let header = self.rpc.l2_header_by_number(block_id).await?;
        let ctx = ProofContext {
            block_id,
            meta,
            header,
            prover: self.prover,
            graffiti: self.graffiti,
        };

        let proof = match self.producer.produce(&ctx, shutdown_token).await {
            Ok(proof) => proof,
            Err(ProducerError::Cancelled) => return Err(Error::Cancelled),
            Err(source) => {
                return Err(Error::Producer {
                    block_id,
                    tier,
                    source,
                });
            }
        };
        debug!(block_id, tier, proof_len = proof.len(), "Proof generated");

        let generated = GeneratedProof {
            block_id,
            tier,
            meta: ctx.meta,
            header: ctx.header,
            proof,
        };

        let opts = self.sender.get_opts().await?;
        let tx = self.builder.build_prove(&opts, &generated, self.graffiti)?;
        let receipt = send_and_confirm(self.sender.as_ref(), tx, shutdown_token).await?;

        self.tracker.set_state(block_id, BlockState::Proved).await;
        info!(
            block_id,
            tier,
            tx_hash = %receipt.tx_hash,
            l1_block = receipt.block_number,
            "Proof submitted"
        );

        Ok(receipt)
    }
}
