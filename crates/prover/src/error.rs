//! Error types for the prover.

use std::io;

use alloy_primitives::B256;
use rollup_attestation_client::AttestationError;
use rollup_prover_types::{EventKind, TierId};
use thiserror::Error;

use crate::sender::TxId;

/// Errors that can occur in the prover.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to load or parse configuration.
    #[error("config error: {0}")]
    Config(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON-RPC error returned by a node.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// Error code.
        code: i64,
        /// Error message.
        message: String,
    },

    /// The requested chain data does not exist (yet).
    #[error("not found")]
    NotFound,

    /// Failed to parse a response.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Failed to encode or decode contract data.
    #[error("ABI error: {0}")]
    Abi(#[from] alloy_sol_types::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml_edit::de::Error),

    /// The protocol declares a tier this prover cannot produce proofs for.
    #[error("unsupported tier: {0}")]
    UnsupportedTier(TierId),

    /// A handler received an event of another kind.
    #[error("unexpected {0} event")]
    UnexpectedEvent(EventKind),

    /// The producer failed to generate a proof.
    #[error("proof generation failed for block {block_id} (tier {tier}): {source}")]
    Producer {
        /// Block the proof was requested for.
        block_id: u64,
        /// Requested tier.
        tier: TierId,
        /// Underlying producer failure.
        #[source]
        source: ProducerError,
    },

    /// The transaction was mined but reverted.
    #[error("transaction {0} reverted")]
    TxReverted(B256),

    /// The transaction was not mined before the confirmation deadline.
    #[error("transaction {0} not confirmed in time")]
    ConfirmationTimeout(B256),

    /// No confirmation channel exists for the transaction id.
    #[error("unknown transaction id {0}")]
    UnknownTx(TxId),

    /// The confirmation channel was closed without a result.
    #[error("confirmation channel for transaction {0} closed without a result")]
    ConfirmationDropped(TxId),

    /// A work channel was closed.
    #[error("{0} channel closed")]
    ChannelClosed(&'static str),

    /// The operation was interrupted by shutdown.
    #[error("operation cancelled")]
    Cancelled,

    /// A transient error persisted after every retry.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Error of the last attempt.
        last: Box<Error>,
    },

    /// Failed to sign a message.
    #[error("signing error: {0}")]
    Signing(String),
}

impl Error {
    /// Returns `true` if the operation may succeed when attempted again.
    ///
    /// Transport failures, server-side JSON-RPC failures and data that is not
    /// indexed yet are transient. Everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::NotFound => true,
            Self::Rpc { code, .. } => is_transient_rpc_code(*code),
            _ => false,
        }
    }

    /// Returns `true` if the error was caused by shutdown.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// HTTP 5xx, JSON-RPC internal error and rate limiting.
fn is_transient_rpc_code(code: i64) -> bool {
    (500..600).contains(&code) || code == 429 || code == -32603 || code == -32005
}

/// Errors raised by proof producers.
#[derive(Debug, Error)]
pub enum ProducerError {
    /// The attestation host could not be reached, even after retrying.
    #[error("attestation host unreachable after {attempts} attempts: {source}")]
    Transport {
        /// Number of attempts made.
        attempts: u32,
        /// Error of the last attempt.
        #[source]
        source: AttestationError,
    },

    /// The attestation host refused or failed to produce the proof.
    #[error("attestation failed: {0}")]
    Attestation(#[source] AttestationError),

    /// Proof generation was interrupted by shutdown.
    #[error("proof generation cancelled")]
    Cancelled,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
