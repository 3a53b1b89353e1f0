//! Proof producers, one per supported tier.

mod guardian;
mod optimistic;
mod sgx;

use std::fmt;

use alloy_primitives::{Address, B256, Bytes};
use async_trait::async_trait;
use rollup_prover_types::{BlockMetadata, L2Header, TierId};
use tokio_util::sync::CancellationToken;

pub use guardian::{GuardianProducer, liveness_bond_proof};
pub use optimistic::{OptimisticProducer, dummy_proof};
pub use sgx::{SgxProducer, SgxProducerConfig};

use crate::error::ProducerError;

/// Everything a producer needs to prove one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofContext {
    pub block_id: u64,
    pub meta: BlockMetadata,
    /// Local L2 header of the block.
    pub header: L2Header,
    /// Address the proof is submitted from.
    pub prover: Address,
    pub graffiti: B256,
}

/// Produces proof bytes for a block.
///
/// Implementations hold only static configuration and may be called concurrently.
#[async_trait]
pub trait ProofProducer: Send + Sync + fmt::Debug {
    /// Tier of the proofs this producer creates.
    fn tier(&self) -> TierId;

    /// Produces the proof for `ctx`, returning early with
    /// [`ProducerError::Cancelled`] on shutdown.
    async fn produce(
        &self,
        ctx: &ProofContext,
        shutdown_token: &CancellationToken,
    ) -> Result<Bytes, ProducerError>;
}
