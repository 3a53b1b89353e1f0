use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

/// Parameters of a `proof` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofParams {
    /// Proof type, `"sgx"` for attestation proofs.
    #[serde(rename = "type")]
    pub proof_type: String,
    /// L2 block id to prove.
    pub block: u64,
    pub l1_rpc: String,
    pub l1_beacon_rpc: String,
    pub l2_rpc: String,
    /// Prover address embedded in the proof.
    pub prover: Address,
    pub graffiti: B256,
    pub sgx: SgxParams,
}

impl ProofParams {
    /// Builds the parameters of an SGX proving request.
    pub fn sgx(
        block: u64,
        l1_rpc: String,
        l1_beacon_rpc: String,
        l2_rpc: String,
        prover: Address,
        graffiti: B256,
    ) -> Self {
        Self {
            proof_type: "sgx".to_string(),
            block,
            l1_rpc,
            l1_beacon_rpc,
            l2_rpc,
            prover,
            graffiti,
            sgx: SgxParams {
                setup: false,
                bootstrap: false,
                prove: true,
            },
        }
    }
}

/// SGX specific switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SgxParams {
    pub setup: bool,
    pub bootstrap: bool,
    pub prove: bool,
}

/// Result of a `proof` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofResponse {
    /// Hex encoded proof.
    pub proof: String,
}

/// JSON-RPC request envelope.
#[derive(Debug, Serialize)]
pub(crate) struct JsonRpcRequest<'a, T> {
    pub(crate) jsonrpc: &'static str,
    pub(crate) id: u64,
    pub(crate) method: &'static str,
    pub(crate) params: [&'a T; 1],
}

/// JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcResponse<T> {
    pub(crate) result: Option<T>,
    pub(crate) error: Option<JsonRpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Deserialize)]
pub(crate) struct JsonRpcError {
    pub(crate) code: i64,
    pub(crate) message: String,
}
