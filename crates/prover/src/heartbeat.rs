//! Guardian liveness reporting.

use std::{fmt, time::Duration};

use alloy_primitives::{Address, B256, Bytes, keccak256};
use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};

/// Message signed in every heartbeat.
const HEARTBEAT_MESSAGE: &[u8] = b"HEART_BEAT";

/// Reports guardian liveness to a health check server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GuardianHeartbeater: Send + Sync {
    /// Signs a proposed block and reports it.
    async fn sign_and_send_block(&self, block_id: u64, block_hash: B256) -> Result<()>;

    /// Reports that the guardian is alive.
    async fn send_heartbeat(&self) -> Result<()>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedBlockRequest {
    #[serde(rename = "blockID")]
    block_id: u64,
    block_hash: B256,
    signature: Bytes,
    prover: Address,
}

#[derive(Debug, Serialize)]
struct HeartbeatRequest {
    prover: Address,
    signature: Bytes,
}

/// [`GuardianHeartbeater`] POSTing secp256k1 signatures to a health check server.
pub struct HealthCheckHeartbeater {
    endpoint: Url,
    signing_key: SigningKey,
    address: Address,
    http_client: reqwest::Client,
}

impl fmt::Debug for HealthCheckHeartbeater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthCheckHeartbeater")
            .field("endpoint", &self.endpoint)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl HealthCheckHeartbeater {
    /// Creates a heartbeater signing with the hex encoded `private_key`.
    pub fn new(endpoint: Url, private_key: &str) -> Result<Self> {
        let bytes = hex::decode(private_key.trim_start_matches("0x"))
            .map_err(|e| Error::Config(format!("invalid guardian private key: {e}")))?;
        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|e| Error::Config(format!("invalid guardian private key: {e}")))?;
        let address = signer_address(&signing_key);
        Ok(Self {
            endpoint,
            signing_key,
            address,
            http_client: reqwest::Client::new(),
        })
    }

    /// Address derived from the signing key.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Signs `hash`, returning `r || s || v`.
    fn sign(&self, hash: B256) -> Result<Bytes> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(hash.as_slice())
            .map_err(|e| Error::Signing(e.to_string()))?;
        let mut out = signature.to_bytes().to_vec();
        out.push(recovery_id.to_byte());
        Ok(out.into())
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<()> {
        let url = self
            .endpoint
            .join(path)
            .map_err(|e| Error::Config(format!("invalid health check endpoint: {e}")))?;
        let response = self.http_client.post(url).json(body).send().await?;
        if !response.status().is_success() {
            return Err(Error::Rpc {
                code: response.status().as_u16() as i64,
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl GuardianHeartbeater for HealthCheckHeartbeater {
    async fn sign_and_send_block(&self, block_id: u64, block_hash: B256) -> Result<()> {
        let signature = self.sign(block_hash)?;
        let request = SignedBlockRequest {
            block_id,
            block_hash,
            signature,
            prover: self.address,
        };
        self.post("signedBlock", &request).await?;
        debug!(block_id, %block_hash, "Signed block sent");
        Ok(())
    }

    async fn send_heartbeat(&self) -> Result<()> {
        let signature = self.sign(keccak256(HEARTBEAT_MESSAGE))?;
        let request = HeartbeatRequest {
            prover: self.address,
            signature,
        };
        self.post("healthCheck", &request).await
    }
}

/// Ethereum address of the key's public key.
fn signer_address(signing_key: &SigningKey) -> Address {
    let point = signing_key.verifying_key().to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Sends a heartbeat every `interval` until shutdown. Failures are logged and skipped.
pub async fn run_heartbeat_loop(
    heartbeater: &dyn GuardianHeartbeater,
    interval: Duration,
    shutdown_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    info!(interval_ms = interval.as_millis() as u64, "Guardian heartbeat loop started");

    loop {
        tokio::select! {
            biased;

            _ = shutdown_token.cancelled() => {
                info!("Guardian heartbeat loop received shutdown signal");
                break;
            }

            _ = ticker.tick() => {
                if let Err(e) = heartbeater.send_heartbeat().await {
                    warn!(error = %e, "Failed to send guardian heartbeat");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    use super::*;

    // Well-known first development account.
    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn heartbeater() -> HealthCheckHeartbeater {
        HealthCheckHeartbeater::new("http://127.0.0.1:1".parse().unwrap(), KEY).unwrap()
    }

    #[test]
    fn test_address_from_private_key() {
        assert_eq!(heartbeater().address(), Address::from_str(ADDRESS).unwrap());
    }

    #[test]
    fn test_invalid_private_key() {
        let endpoint: Url = "http://localhost".parse().unwrap();
        assert!(matches!(
            HealthCheckHeartbeater::new(endpoint.clone(), "0xzz"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            HealthCheckHeartbeater::new(endpoint, "0x01"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_signature_recovers_signer() {
        let heartbeater = heartbeater();
        let hash = B256::repeat_byte(0x42);
        let signature = heartbeater.sign(hash).unwrap();
        assert_eq!(signature.len(), 65);

        let sig = Signature::from_slice(&signature[..64]).unwrap();
        let recovery_id = RecoveryId::from_byte(signature[64]).unwrap();
        let key = VerifyingKey::recover_from_prehash(hash.as_slice(), &sig, recovery_id).unwrap();
        assert_eq!(&key, heartbeater.signing_key.verifying_key());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_error() {
        let result = heartbeater().send_heartbeat().await;
        assert!(matches!(result, Err(Error::Http(_))));
    }
}
