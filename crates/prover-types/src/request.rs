//! Work items passed between handlers and submitters.

use alloy_primitives::{B256, Bytes};
use serde::{Deserialize, Serialize};

use crate::{BlockMetadata, L2Header, TierId};

/// Request to generate and submit a proof of `tier` for a block.
///
/// Produced by the `BlockProposed` handler, or by the contest and expiry handlers
/// when a block needs to be proven again. Consumed exactly once by the submitter
/// of `tier`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRequest {
    pub block_id: u64,
    pub tier: TierId,
    pub meta: BlockMetadata,
}

/// Request to contest the current transition of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestRequest {
    pub block_id: u64,
    /// L1 height the block was proposed in.
    pub proposed_in: u64,
    pub parent_hash: B256,
    pub meta: BlockMetadata,
    /// Tier of the contested transition.
    pub tier: TierId,
}

/// Proof bytes produced for a block, together with the header they prove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedProof {
    pub block_id: u64,
    pub tier: TierId,
    pub meta: BlockMetadata,
    pub header: L2Header,
    pub proof: Bytes,
}
