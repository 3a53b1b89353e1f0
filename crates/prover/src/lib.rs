//! Rollup prover - follows the rollup contract on L1 and proves, contests and
//! defends L2 block transitions.
//!
//! This crate provides functionality to:
//! - Resolve the L1 block to resume from and grant bond allowances at startup
//! - Poll rollup events from L1 and decide which blocks to prove or contest
//! - Produce proofs per protocol tier (optimistic, SGX attestation, guardian)
//! - Submit proofs and contests, waiting for their confirmation
//!
//! ## Example
//!
//! ```ignore
//! use rollup_prover::{Collaborators, Config, Prover};
//!
//! let config = Arc::new(Config::load("config.toml")?);
//! let collaborators = Collaborators::from_config(&config, &shutdown_token)?;
//! let prover = Prover::init(config, collaborators, &shutdown_token).await?;
//!
//! for handle in prover.spawn(&shutdown_token) {
//!     handle.await?;
//! }
//! ```

pub mod allowance;
pub mod bindings;
pub mod bootstrap;
pub mod config;
pub mod contester;
pub mod error;
pub mod handler;
pub mod heartbeat;
pub mod producer;
pub mod registry;
pub mod retry;
pub mod rpc;
pub mod sender;
pub mod service;
pub mod state;
pub mod submitter;
pub mod subscription;
pub mod tracker;
pub mod tx_builder;

#[cfg(test)]
mod test_utils;

// Re-export main types at crate root for convenience.
pub use bootstrap::{CursorSource, L1Cursor, init_l1_current};
pub use config::Config;
pub use error::{Error, ProducerError, Result};
pub use retry::RetryPolicy;
pub use rpc::{HttpRpcClient, ProverRpc};
pub use sender::{TxSender, send_and_confirm};
pub use service::{Collaborators, Prover};
pub use state::SharedState;
pub use tracker::{BlockState, BlockTracker, WorkKey};
