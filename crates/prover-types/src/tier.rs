use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Protocol tier identifier.
pub type TierId = u16;

/// Tier that accepts proofs without verification, relying on contestation.
pub const TIER_OPTIMISTIC_ID: TierId = 100;
/// Tier backed by a remote attestation (SGX) proof.
pub const TIER_SGX_ID: TierId = 200;
/// Tier reserved to guardian provers. It is the highest tier and cannot be contested.
pub const TIER_GUARDIAN_ID: TierId = 1000;

/// Kind of proof a tier requires.
///
/// The set is closed: tiers are fixed by the protocol, so anything else is a
/// configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierKind {
    /// No real proof, see [`TIER_OPTIMISTIC_ID`].
    Optimistic,
    /// Remote attestation proof, see [`TIER_SGX_ID`].
    Sgx,
    /// Guardian approval, see [`TIER_GUARDIAN_ID`].
    Guardian,
}

impl TierKind {
    /// Returns the kind for a protocol tier id, or `None` for ids this prover does not support.
    pub fn from_id(id: TierId) -> Option<Self> {
        match id {
            TIER_OPTIMISTIC_ID => Some(Self::Optimistic),
            TIER_SGX_ID => Some(Self::Sgx),
            TIER_GUARDIAN_ID => Some(Self::Guardian),
            _ => None,
        }
    }

    /// Returns the protocol tier id of this kind.
    pub fn id(&self) -> TierId {
        match self {
            Self::Optimistic => TIER_OPTIMISTIC_ID,
            Self::Sgx => TIER_SGX_ID,
            Self::Guardian => TIER_GUARDIAN_ID,
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Optimistic => f.write_str("optimistic"),
            Self::Sgx => f.write_str("sgx"),
            Self::Guardian => f.write_str("guardian"),
        }
    }
}

/// A protocol tier as published by the rollup contract's tier provider.
///
/// Tiers are read once at startup and never mutated. Their ordering by id is the
/// escalation order (optimistic, then attested, then guardian).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    /// Protocol tier id.
    pub id: TierId,
    /// Bond the prover locks when submitting a proof of this tier.
    pub validity_bond: alloy_primitives::U256,
    /// Bond a contester locks when contesting a proof of this tier.
    pub contest_bond: alloy_primitives::U256,
    /// Time after which an uncontested proof of this tier can be verified.
    pub cooldown_window: Duration,
    /// Time the assigned prover has to submit a proof of this tier.
    pub proving_window: Duration,
    /// Maximum number of blocks verified per proof.
    pub max_blocks_to_verify: u8,
}

impl Tier {
    /// Creates a tier with zero bonds and the given proving window.
    pub fn new(id: TierId, proving_window: Duration) -> Self {
        Self {
            id,
            validity_bond: Default::default(),
            contest_bond: Default::default(),
            cooldown_window: Duration::ZERO,
            proving_window,
            max_blocks_to_verify: 0,
        }
    }

    /// Returns the kind of this tier, or `None` if the id is not supported.
    pub fn kind(&self) -> Option<TierKind> {
        TierKind::from_id(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_id() {
        assert_eq!(TierKind::from_id(100), Some(TierKind::Optimistic));
        assert_eq!(TierKind::from_id(200), Some(TierKind::Sgx));
        assert_eq!(TierKind::from_id(1000), Some(TierKind::Guardian));
        assert_eq!(TierKind::from_id(300), None);
    }

    #[test]
    fn test_kind_ordering_follows_escalation() {
        assert!(TierKind::Optimistic < TierKind::Sgx);
        assert!(TierKind::Sgx < TierKind::Guardian);
        assert!(TierKind::Optimistic.id() < TierKind::Guardian.id());
    }
}
