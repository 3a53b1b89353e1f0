//! HTTP client for the remote attestation ("raiko") host.
//!
//! The attestation host generates SGX proofs for L2 blocks. It is driven through a
//! single JSON-RPC method, `proof`, which blocks until the proof is ready and may
//! take minutes.
//!
//! ## Example
//!
//! ```no_run
//! use rollup_attestation_client::{AttestationClient, ProofParams};
//!
//! # async fn example() -> Result<(), rollup_attestation_client::AttestationError> {
//! let client = AttestationClient::new("http://localhost:8080")?;
//! let params = ProofParams::sgx(
//!     42,
//!     "http://l1:8545".into(),
//!     "http://l1-beacon:5052".into(),
//!     "http://l2:8545".into(),
//!     Default::default(),
//!     Default::default(),
//! );
//! let proof = client.request_proof(&params).await?;
//! println!("proof is {} bytes", proof.len());
//! # Ok(())
//! # }
//! ```

pub use client::AttestationClient;
pub use error::AttestationError;
pub use types::{ProofParams, ProofResponse, SgxParams};

mod client;
mod error;
mod types;
