//! Mapping from protocol tiers to producers and submitters.

use std::sync::Arc;

use rollup_attestation_client::AttestationClient;
use rollup_prover_types::{Tier, TierId, TierKind};
use tracing::info;

use crate::{
    error::{Error, Result},
    producer::{
        GuardianProducer, OptimisticProducer, ProofProducer, SgxProducer, SgxProducerConfig,
    },
    retry::RetryPolicy,
    submitter::ProofSubmitter,
};

/// Static configuration of the producers.
#[derive(Debug, Clone)]
pub struct ProducerSettings {
    pub sgx: SgxProducerConfig,
    /// Attestation host, required unless `dummy` is set.
    pub raiko_host_endpoint: Option<url::Url>,
    pub dummy: bool,
    pub enable_liveness_bond_proof: bool,
    pub retry: RetryPolicy,
}

/// Builds the producer of `tier`.
///
/// Tiers are fixed by the protocol: any id without a producer is a configuration error.
pub fn producer_for_tier(tier: &Tier, settings: &ProducerSettings) -> Result<Arc<dyn ProofProducer>> {
    let kind = tier.kind().ok_or(Error::UnsupportedTier(tier.id))?;
    let producer: Arc<dyn ProofProducer> = match kind {
        TierKind::Optimistic => Arc::new(OptimisticProducer),
        TierKind::Sgx if settings.dummy => {
            Arc::new(SgxProducer::dummy(settings.sgx.clone(), settings.retry))
        }
        TierKind::Sgx => {
            let endpoint = settings.raiko_host_endpoint.clone().ok_or_else(|| {
                Error::Config("sgx tier requires raiko_host_endpoint".to_string())
            })?;
            let client = AttestationClient::new(endpoint)
                .map_err(|e| Error::Config(format!("invalid raiko_host_endpoint: {e}")))?;
            Arc::new(SgxProducer::new(client, settings.sgx.clone(), settings.retry))
        }
        TierKind::Guardian => Arc::new(GuardianProducer::new(settings.enable_liveness_bond_proof)),
    };
    info!(tier = tier.id, %kind, "Proof producer configured");
    Ok(producer)
}

/// Submitters of every protocol tier, ordered by tier id.
#[derive(Debug, Clone)]
pub struct TierRegistry {
    submitters: Vec<ProofSubmitter>,
}

impl TierRegistry {
    /// Builds one submitter per tier with `make_submitter`.
    ///
    /// Fails on the first tier without a producer, before anything else is wired.
    pub fn new(
        tiers: &[Tier],
        settings: &ProducerSettings,
        mut make_submitter: impl FnMut(Arc<dyn ProofProducer>) -> ProofSubmitter,
    ) -> Result<Self> {
        let submitters = tiers
            .iter()
            .map(|tier| producer_for_tier(tier, settings).map(&mut make_submitter))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_submitters(submitters))
    }

    /// Wraps already built submitters.
    pub fn from_submitters(mut submitters: Vec<ProofSubmitter>) -> Self {
        submitters.sort_by_key(ProofSubmitter::tier);
        Self { submitters }
    }

    /// Submitters ordered by tier id.
    pub fn submitters(&self) -> &[ProofSubmitter] {
        &self.submitters
    }

    /// Returns the submitter of `tier`.
    pub fn submitter(&self, tier: TierId) -> Option<&ProofSubmitter> {
        self.submitters.iter().find(|s| s.tier() == tier)
    }

    /// Tier ids in escalation order.
    pub fn tier_ids(&self) -> Vec<TierId> {
        self.submitters.iter().map(ProofSubmitter::tier).collect()
    }
}

/// Picks the tier to prove a block with.
///
/// Guardian provers always use the guardian tier. Everyone else uses the lowest
/// available tier that is not below `min_tier`, excluding the guardian tier.
pub fn select_tier(tier_ids: &[TierId], min_tier: TierId, guardian: bool) -> Option<TierId> {
    if guardian {
        return tier_ids
            .iter()
            .copied()
            .find(|id| TierKind::from_id(*id) == Some(TierKind::Guardian));
    }
    tier_ids
        .iter()
        .copied()
        .filter(|id| TierKind::from_id(*id) != Some(TierKind::Guardian))
        .filter(|id| *id >= min_tier)
        .min()
}

/// Returns the lowest tier strictly above `tier`.
pub fn next_tier_above(tier_ids: &[TierId], tier: TierId) -> Option<TierId> {
    tier_ids.iter().copied().filter(|id| *id > tier).min()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use alloy_primitives::{Address, B256};

    use super::*;
    use crate::{
        sender::MockTxSender,
        test_utils::{FakeRpc, tier},
        tracker::BlockTracker,
        tx_builder::MockTxBuilder,
    };

    fn settings() -> ProducerSettings {
        ProducerSettings {
            sgx: SgxProducerConfig {
                l1_endpoint: "http://l1".parse().unwrap(),
                l1_beacon_endpoint: None,
                l2_endpoint: "http://l2".parse().unwrap(),
            },
            raiko_host_endpoint: None,
            dummy: true,
            enable_liveness_bond_proof: false,
            retry: RetryPolicy::new(Duration::from_millis(1), 1),
        }
    }

    fn make_submitter(producer: Arc<dyn ProofProducer>) -> ProofSubmitter {
        ProofSubmitter::new(
            Arc::new(FakeRpc::new()),
            producer,
            Arc::new(MockTxSender::new()),
            Arc::new(MockTxBuilder::new()),
            Arc::new(BlockTracker::new()),
            Address::ZERO,
            B256::ZERO,
        )
    }

    #[test]
    fn test_registry_orders_submitters_by_tier() {
        let tiers = [tier(1000), tier(100), tier(200)];
        let registry = TierRegistry::new(&tiers, &settings(), make_submitter).unwrap();
        assert_eq!(registry.tier_ids(), vec![100, 200, 1000]);
        assert!(registry.submitter(200).is_some());
    }

    #[test]
    fn test_unknown_tier_fails_construction() {
        let tiers = [tier(100), tier(250)];
        let mut built = 0;
        let result = TierRegistry::new(&tiers, &settings(), |producer| {
            built += 1;
            make_submitter(producer)
        });
        assert!(matches!(result, Err(Error::UnsupportedTier(250))));
        assert_eq!(built, 1);
    }

    #[test]
    fn test_sgx_without_endpoint_is_config_error() {
        let settings = ProducerSettings {
            dummy: false,
            ..settings()
        };
        let result = producer_for_tier(&tier(200), &settings);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_select_tier() {
        let ids = [100, 200, 1000];
        assert_eq!(select_tier(&ids, 100, false), Some(100));
        assert_eq!(select_tier(&ids, 200, false), Some(200));
        assert_eq!(select_tier(&ids, 300, false), None);
        assert_eq!(select_tier(&ids, 100, true), Some(1000));
        assert_eq!(select_tier(&[100, 200], 100, true), None);
    }

    #[test]
    fn test_next_tier_above() {
        let ids = [100, 200, 1000];
        assert_eq!(next_tier_above(&ids, 100), Some(200));
        assert_eq!(next_tier_above(&ids, 200), Some(1000));
        assert_eq!(next_tier_above(&ids, 1000), None);
    }
}
