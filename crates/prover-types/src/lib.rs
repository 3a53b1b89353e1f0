//! Shared type definitions for the rollup prover.
//!
//! This crate provides the plain data carried between the prover's stages:
//! - Chain data read from L1 and L2 (headers, L1 origins, protocol state)
//! - Protocol tiers and their proving rules
//! - L1 events emitted by the rollup contract
//! - Work items passed over channels (proof requests, contest requests, generated proofs)
//!
//! Values here are owned by exactly one stage at a time and moved along channels,
//! so every type is `Clone` but none carries shared mutable state.

mod chain;
mod event;
mod request;
mod tier;

pub use chain::{
    BlockMetadata, L1Header, L1Origin, L2Header, ProofStatus, ProtocolStateVariables, Transition,
    TransitionState,
};
pub use event::{
    BlockProposedEvent, BlockVerifiedEvent, ChainEvent, EventKind, EventOrigin,
    TransitionContestedEvent, TransitionProvedEvent,
};
pub use request::{ContestRequest, GeneratedProof, ProofRequest};
pub use tier::{
    TIER_GUARDIAN_ID, TIER_OPTIMISTIC_ID, TIER_SGX_ID, Tier, TierId, TierKind,
};

pub use alloy_primitives::{Address, B256, Bytes, U256};
