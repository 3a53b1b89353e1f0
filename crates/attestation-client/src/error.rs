use thiserror::Error;

/// Error type for attestation host requests.
#[derive(Debug, Error)]
pub enum AttestationError {
    /// The request never produced a response (connection, timeout, truncated body).
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The host answered with an HTTP error status.
    #[error("Attestation host returned status {status}: {}", msg.as_deref().unwrap_or("Unknown"))]
    ErrorStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        msg: Option<String>,
    },
    /// The host returned a JSON-RPC error object.
    #[error("Attestation failed with code {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },
    /// The host returned no proof.
    #[error("Attestation host returned an empty proof")]
    EmptyProof,
    /// The proof was not valid hex.
    #[error("Invalid proof encoding: {0}")]
    InvalidProof(String),
    /// The host answered with a body that is not a JSON-RPC response.
    #[error("Malformed attestation host response: {0}")]
    InvalidResponse(String),
}

impl AttestationError {
    /// Returns `true` if the failure happened on the way to or from the host and the
    /// request may succeed when sent again.
    ///
    /// Errors reported by the host itself are terminal for the block.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::ErrorStatus { status, .. } => *status >= 500,
            Self::Rpc { .. }
            | Self::EmptyProof
            | Self::InvalidProof(_)
            | Self::InvalidResponse(_) => false,
        }
    }
}
