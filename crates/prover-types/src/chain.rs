//! Chain data read from L1 and L2.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::TierId;

/// Minimal L1 block header used as the prover's cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1Header {
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    pub timestamp: u64,
}

/// Minimal L2 block header, enough to build a transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L2Header {
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    pub state_root: B256,
    pub timestamp: u64,
}

/// L1 origin of an L2 block, as recorded by the L2 execution engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct L1Origin {
    pub block_id: u64,
    pub l2_block_hash: B256,
    pub l1_block_height: u64,
    pub l1_block_hash: B256,
}

/// The subset of the rollup contract's state variables the prover reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolStateVariables {
    /// L1 height at which the rollup was deployed.
    pub genesis_height: u64,
    pub genesis_timestamp: u64,
    /// Number of proposed blocks, including genesis.
    pub num_blocks: u64,
    /// Highest verified L2 block id. Zero means nothing was verified yet.
    pub last_verified_block_id: u64,
}

/// Metadata of a proposed block as emitted in `BlockProposed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMetadata {
    pub l1_hash: B256,
    pub difficulty: B256,
    pub blob_hash: B256,
    pub extra_data: B256,
    pub deposits_hash: B256,
    pub coinbase: Address,
    pub id: u64,
    pub gas_limit: u32,
    /// Proposal timestamp, the start of the proving window.
    pub timestamp: u64,
    /// L1 height the block was proposed at.
    pub l1_height: u64,
    /// Lowest tier a proof for this block may use.
    pub min_tier: TierId,
    pub blob_used: bool,
    pub parent_meta_hash: B256,
    pub sender: Address,
}

/// A state transition claimed by a proof.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub parent_hash: B256,
    pub block_hash: B256,
    pub state_root: B256,
    pub graffiti: B256,
}

/// On-chain state of the current transition of a block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionState {
    pub key: B256,
    pub block_hash: B256,
    pub state_root: B256,
    pub prover: Address,
    pub validity_bond: U256,
    /// Zero when the transition was never contested.
    pub contester: Address,
    pub contest_bond: U256,
    pub timestamp: u64,
    pub tier: TierId,
    pub contestations: u8,
}

impl TransitionState {
    /// Returns `true` when no proof has been submitted for this transition.
    pub fn is_empty(&self) -> bool {
        self.block_hash.is_zero() && self.prover.is_zero()
    }

    /// Returns `true` when the transition is currently contested.
    pub fn is_contested(&self) -> bool {
        !self.contester.is_zero()
    }
}

/// Proof status of a block, from the point of view of the local L2 chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProofStatus {
    /// A transition was submitted on-chain for the block's parent.
    pub is_submitted: bool,
    /// The submitted transition disagrees with the local canonical chain.
    pub invalid: bool,
    /// Current on-chain transition, if any.
    pub current_transition: Option<TransitionState>,
    /// Local parent header the transition was looked up with.
    pub parent_header: L2Header,
}

impl ProofStatus {
    /// Status of a block with no submitted proof.
    pub fn not_submitted(parent_header: L2Header) -> Self {
        Self {
            is_submitted: false,
            invalid: false,
            current_transition: None,
            parent_header,
        }
    }

    /// Compares an on-chain transition against the local L2 header.
    pub fn from_transition(
        transition: TransitionState,
        parent_header: L2Header,
        local_header: &L2Header,
    ) -> Self {
        if transition.is_empty() {
            return Self::not_submitted(parent_header);
        }
        let invalid = transition.block_hash != local_header.hash
            || transition.state_root != local_header.state_root;
        Self {
            is_submitted: true,
            invalid,
            current_transition: Some(transition),
            parent_header,
        }
    }
}
