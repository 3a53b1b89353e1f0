//! L1 events emitted by the rollup contract.

use std::fmt;

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{BlockMetadata, TierId, Transition};

/// Kind of L1 event the prover subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    BlockProposed,
    TransitionProved,
    TransitionContested,
    BlockVerified,
}

impl EventKind {
    /// All event kinds with a dedicated subscription.
    pub const ALL: [EventKind; 4] = [
        Self::BlockProposed,
        Self::TransitionProved,
        Self::TransitionContested,
        Self::BlockVerified,
    ];
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BlockProposed => "BlockProposed",
            Self::TransitionProved => "TransitionProved",
            Self::TransitionContested => "TransitionContested",
            Self::BlockVerified => "BlockVerified",
        };
        f.write_str(name)
    }
}

/// Where on L1 an event was emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOrigin {
    pub block_number: u64,
    pub block_hash: B256,
    pub tx_hash: B256,
    pub log_index: u64,
}

/// A block was proposed to the rollup contract.
///
/// The identity of a proposed block is the pair `(block_id, origin.block_hash)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockProposedEvent {
    pub block_id: u64,
    /// Prover obligated to prove the block. Zero when the block is unassigned.
    pub assigned_prover: Address,
    pub liveness_bond: U256,
    pub meta: BlockMetadata,
    pub origin: EventOrigin,
}

/// A transition was proved on-chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionProvedEvent {
    pub block_id: u64,
    pub transition: Transition,
    pub prover: Address,
    pub validity_bond: U256,
    pub tier: TierId,
    pub origin: EventOrigin,
}

/// A proved transition was contested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionContestedEvent {
    pub block_id: u64,
    pub transition: Transition,
    pub contester: Address,
    pub contest_bond: U256,
    pub tier: TierId,
    pub origin: EventOrigin,
}

/// A block reached finality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockVerifiedEvent {
    pub block_id: u64,
    pub assigned_prover: Address,
    pub prover: Address,
    pub block_hash: B256,
    pub state_root: B256,
    pub tier: TierId,
    pub contestations: u8,
    pub origin: EventOrigin,
}

/// Any event the prover follows, as decoded from an L1 log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainEvent {
    BlockProposed(BlockProposedEvent),
    TransitionProved(TransitionProvedEvent),
    TransitionContested(TransitionContestedEvent),
    BlockVerified(BlockVerifiedEvent),
}

impl ChainEvent {
    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::BlockProposed(_) => EventKind::BlockProposed,
            Self::TransitionProved(_) => EventKind::TransitionProved,
            Self::TransitionContested(_) => EventKind::TransitionContested,
            Self::BlockVerified(_) => EventKind::BlockVerified,
        }
    }

    /// Returns the L2 block id the event refers to.
    pub fn block_id(&self) -> u64 {
        match self {
            Self::BlockProposed(e) => e.block_id,
            Self::TransitionProved(e) => e.block_id,
            Self::TransitionContested(e) => e.block_id,
            Self::BlockVerified(e) => e.block_id,
        }
    }

    /// Returns where on L1 the event was emitted.
    pub fn origin(&self) -> &EventOrigin {
        match self {
            Self::BlockProposed(e) => &e.origin,
            Self::TransitionProved(e) => &e.origin,
            Self::TransitionContested(e) => &e.origin,
            Self::BlockVerified(e) => &e.origin,
        }
    }
}
