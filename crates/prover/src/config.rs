//! Configuration types for the prover.

use std::{path::Path, time::Duration};

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    error::{Error, Result},
    retry::RetryPolicy,
};

/// Prover configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// L1 HTTP JSON-RPC endpoint.
    pub l1_http_endpoint: Url,
    /// L1 beacon API endpoint, forwarded to the attestation host.
    pub l1_beacon_endpoint: Option<Url>,
    /// L2 HTTP JSON-RPC endpoint.
    pub l2_http_endpoint: Url,
    /// Protocol contract addresses.
    pub contracts: ContractsConfig,
    /// Address the prover submits proofs from. The L1 node must be able to sign for it.
    pub prover_address: Address,
    /// Opaque tag embedded in every submitted transition.
    #[serde(default)]
    pub graffiti: String,
    /// Bond token allowance to grant the protocol contracts at startup.
    pub allowance: Option<U256>,
    /// Attestation (SGX) tier settings.
    #[serde(default)]
    pub sgx: SgxConfig,
    /// Attach the liveness bond return proof to guardian proofs.
    #[serde(default)]
    pub enable_liveness_bond_proof: bool,
    /// Base delay between retries of transient RPC failures.
    #[serde(default = "default_backoff_retry_interval_ms")]
    pub backoff_retry_interval_ms: u64,
    /// Maximum number of retries of transient RPC failures.
    #[serde(default = "default_backoff_max_retries")]
    pub backoff_max_retries: u32,
    /// Contest proofs that disagree with the local L2 chain.
    #[serde(default)]
    pub contester_mode: bool,
    /// Prove blocks assigned to other provers once their proving window expired.
    #[serde(default)]
    pub prove_unassigned_blocks: bool,
    /// L2 block id to resume from, instead of the last verified block.
    pub starting_block_id: Option<u64>,
    /// Guardian prover settings. Guardian mode is enabled when present.
    pub guardian: Option<GuardianConfig>,
    /// Interval between two L1 log polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum number of proofs submitted concurrently per tier.
    #[serde(default = "default_submitter_concurrency")]
    pub submitter_concurrency: usize,
    /// Maximum time to wait for a transaction receipt.
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    /// Capacity of each work channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Protocol contract addresses.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractsConfig {
    /// L1 rollup contract, receives proofs and emits the events the prover follows.
    pub rollup: Address,
    /// Bond token on L1.
    pub bond_token: Address,
    /// Tier provider, defaults to the rollup contract.
    pub tier_provider: Option<Address>,
    /// Guardian prover contract, receives guardian tier proofs.
    pub guardian_prover: Option<Address>,
}

impl ContractsConfig {
    /// Returns the contract publishing the tier catalog.
    pub fn tier_provider(&self) -> Address {
        self.tier_provider.unwrap_or(self.rollup)
    }
}

/// Attestation (SGX) tier settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SgxConfig {
    /// Attestation host endpoint.
    pub raiko_host_endpoint: Option<Url>,
    /// Skip the attestation host and produce dummy proofs.
    #[serde(default)]
    pub dummy: bool,
}

/// Guardian prover settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuardianConfig {
    /// Hex encoded secp256k1 key used to sign blocks and heartbeats.
    pub private_key: String,
    /// Health check server receiving signed blocks and heartbeats.
    pub health_check_endpoint: Url,
    /// Interval between two heartbeats.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

fn default_backoff_retry_interval_ms() -> u64 {
    12_000
}

fn default_backoff_max_retries() -> u32 {
    5
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

fn default_submitter_concurrency() -> usize {
    4
}

fn default_confirmation_timeout_secs() -> u64 {
    300
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_heartbeat_interval_ms() -> u64 {
    12_000
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml_edit::de::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.graffiti.len() > 32 {
            return Err(Error::Config(format!(
                "graffiti must be at most 32 bytes, got {}",
                self.graffiti.len()
            )));
        }
        if self.submitter_concurrency == 0 {
            return Err(Error::Config(
                "submitter_concurrency must be at least 1".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be at least 1".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be non-zero".to_string()));
        }
        if self.guardian.as_ref().is_some_and(|g| g.heartbeat_interval_ms == 0) {
            return Err(Error::Config(
                "guardian.heartbeat_interval_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns `true` if the prover runs as a guardian prover.
    pub fn is_guardian(&self) -> bool {
        self.guardian.is_some()
    }

    /// Returns the graffiti as a right-padded 32 byte word.
    pub fn graffiti_bytes(&self) -> B256 {
        graffiti_to_bytes(&self.graffiti)
    }

    /// Returns the retry policy for transient RPC failures.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.backoff_retry_interval_ms),
            self.backoff_max_retries,
        )
    }

    /// Returns the L1 log poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the transaction confirmation deadline.
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

/// Right-pads the graffiti into a 32 byte word. Longer strings are truncated.
pub fn graffiti_to_bytes(graffiti: &str) -> B256 {
    let mut word = [0u8; 32];
    let bytes = graffiti.as_bytes();
    let len = bytes.len().min(32);
    word[..len].copy_from_slice(&bytes[..len]);
    B256::from(word)
}
