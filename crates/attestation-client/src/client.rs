use std::str::FromStr;

use alloy_primitives::Bytes;
use reqwest::{Client, IntoUrl, Url};

use crate::{
    AttestationError, ProofParams, ProofResponse,
    types::{JsonRpcRequest, JsonRpcResponse},
};

/// HTTP client for the attestation host.
#[derive(Clone, Debug)]
pub struct AttestationClient {
    base_url: Url,
    client: Client,
}

impl AttestationClient {
    /// Creates a new client connected to the specified host URL.
    pub fn new(base_url: impl IntoUrl) -> Result<Self, AttestationError> {
        Ok(Self {
            base_url: base_url.into_url()?,
            client: Client::new(),
        })
    }

    /// Creates a new client with a custom [`reqwest::Client`].
    pub fn with_client(base_url: impl IntoUrl, client: Client) -> Result<Self, AttestationError> {
        Ok(Self {
            base_url: base_url.into_url()?,
            client,
        })
    }

    /// Returns the host URL.
    pub fn url(&self) -> &Url {
        &self.base_url
    }

    /// Requests a proof and waits for the host to return it.
    ///
    /// The call does not time out on its own: proving takes as long as it takes, and
    /// callers stop waiting by dropping the future.
    pub async fn request_proof(&self, params: &ProofParams) -> Result<Bytes, AttestationError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: params.block,
            method: "proof",
            params: [params],
        };

        let res = self
            .client
            .post(self.base_url.clone())
            .json(&request)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let msg = res.text().await.ok().filter(|msg| !msg.is_empty());
            return Err(AttestationError::ErrorStatus {
                status: status.as_u16(),
                msg,
            });
        }

        let response: JsonRpcResponse<ProofResponse> = res.json().await.map_err(|e| {
            if e.is_decode() {
                AttestationError::InvalidResponse(e.to_string())
            } else {
                AttestationError::Transport(e)
            }
        })?;
        if let Some(error) = response.error {
            return Err(AttestationError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let Some(output) = response.result else {
            return Err(AttestationError::EmptyProof);
        };
        parse_proof(&output.proof)
    }
}

/// Decodes the hex proof returned by the host.
fn parse_proof(proof: &str) -> Result<Bytes, AttestationError> {
    let proof = Bytes::from_str(proof).map_err(|e| AttestationError::InvalidProof(e.to_string()))?;
    if proof.is_empty() {
        return Err(AttestationError::EmptyProof);
    }
    Ok(proof)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, B256};
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;

    fn params() -> ProofParams {
        ProofParams::sgx(
            1,
            String::new(),
            String::new(),
            String::new(),
            Address::ZERO,
            B256::ZERO,
        )
    }

    /// Serves a single HTTP 200 response with `body`.
    async fn serve_once(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_parse_proof() {
        assert_eq!(parse_proof("0x0102").unwrap(), Bytes::from(vec![1u8, 2]));
        assert!(matches!(parse_proof("0x"), Err(AttestationError::EmptyProof)));
        assert!(matches!(
            parse_proof("0xzz"),
            Err(AttestationError::InvalidProof(_))
        ));
    }

    #[test]
    fn test_invalid_url() {
        assert!(AttestationClient::new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_retryable() {
        let client = AttestationClient::new("http://127.0.0.1:1").unwrap();
        let err = client.request_proof(&params()).await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error {err}");
    }

    #[tokio::test]
    async fn test_malformed_response_is_terminal() {
        let client = AttestationClient::new(serve_once("<html>gateway</html>").await).unwrap();
        let err = client.request_proof(&params()).await.unwrap_err();
        assert!(
            matches!(err, AttestationError::InvalidResponse(_)),
            "unexpected error {err}"
        );
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_proof_response_is_decoded() {
        let client = AttestationClient::new(
            serve_once(r#"{"jsonrpc":"2.0","id":1,"result":{"proof":"0x0102"}}"#).await,
        )
        .unwrap();
        let proof = client.request_proof(&params()).await.unwrap();
        assert_eq!(proof, Bytes::from(vec![1u8, 2]));
    }
}
