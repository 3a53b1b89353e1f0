use alloy_primitives::Bytes;
use async_trait::async_trait;
use rollup_prover_types::{TIER_OPTIMISTIC_ID, TierId};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ProofContext, ProofProducer};
use crate::error::ProducerError;

/// Proof bytes accepted by tiers that do not verify proofs.
pub fn dummy_proof() -> Bytes {
    Bytes::from(vec![0xff; 100])
}

/// Producer of the optimistic tier. Makes no external call.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimisticProducer;

#[async_trait]
impl ProofProducer for OptimisticProducer {
    fn tier(&self) -> TierId {
        TIER_OPTIMISTIC_ID
    }

    async fn produce(
        &self,
        ctx: &ProofContext,
        _shutdown_token: &CancellationToken,
    ) -> Result<Bytes, ProducerError> {
        debug!(block_id = ctx.block_id, "Optimistic proof generated");
        Ok(dummy_proof())
    }
}
