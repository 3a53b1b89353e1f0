//! JSON-RPC access to the L1 and L2 nodes.

use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_rpc_types_eth::{
    BlockNumberOrTag, Filter, Header, Log, TransactionInput, TransactionRequest,
};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use rollup_prover_types::{
    BlockProposedEvent, ChainEvent, EventKind, EventOrigin, L1Header, L1Origin, L2Header,
    ProtocolStateVariables, Tier, TransitionState,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::{
    bindings::{self, IERC20, IRollupL1, ITierProvider},
    error::{Error, Result},
    sender::{TxCandidate, TxOptions},
};

/// JSON-RPC error code returned by nodes when an `eth_call` reverts.
const EXECUTION_REVERTED: i64 = 3;

/// JSON-RPC request structure.
#[derive(Debug, Clone, Serialize)]
struct JsonRpcRequest<T> {
    jsonrpc: &'static str,
    method: &'static str,
    params: T,
    id: u64,
}

/// JSON-RPC response structure.
#[derive(Debug, Clone, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC error structure.
#[derive(Debug, Clone, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Minimal JSON-RPC client over HTTP.
#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    url: Url,
    http_client: reqwest::Client,
}

impl JsonRpcClient {
    /// Create a new client.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            http_client: reqwest::Client::new(),
        }
    }

    /// Return url of the node.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Send a JSON-RPC request to the node.
    ///
    /// Returns `None` if the RPC response has a null `result`.
    pub async fn request<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: P,
    ) -> Result<Option<R>> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let response = self
            .http_client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Rpc {
                code: response.status().as_u16() as i64,
                message: response.text().await.unwrap_or_default(),
            });
        }

        let rpc_response: JsonRpcResponse<R> = response.json().await?;

        if let Some(error) = rpc_response.error {
            return Err(Error::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(rpc_response.result)
    }

    /// Like [`request`](Self::request), mapping a null result to [`Error::NotFound`].
    pub async fn request_some<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: P,
    ) -> Result<R> {
        self.request(method, params).await?.ok_or(Error::NotFound)
    }

    /// Executes a read-only contract call against the latest block.
    pub async fn call<C: SolCall>(&self, to: Address, call: C) -> Result<C::Return> {
        let request = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(call.abi_encode().into()));
        let output: Bytes = self.request_some("eth_call", (request, "latest")).await?;
        Ok(C::abi_decode_returns(&output)?)
    }
}

fn l1_header(h: Header) -> L1Header {
    L1Header {
        number: h.inner.number,
        hash: h.hash,
        parent_hash: h.inner.parent_hash,
        timestamp: h.inner.timestamp,
    }
}

fn l2_header(h: Header) -> L2Header {
    L2Header {
        number: h.inner.number,
        hash: h.hash,
        parent_hash: h.inner.parent_hash,
        state_root: h.inner.state_root,
        timestamp: h.inner.timestamp,
    }
}

/// L1 origin as returned by `taiko_l1OriginByID`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcL1Origin {
    #[serde(rename = "blockID")]
    block_id: U256,
    l2_block_hash: B256,
    l1_block_height: U256,
    l1_block_hash: B256,
}

impl From<RpcL1Origin> for L1Origin {
    fn from(o: RpcL1Origin) -> Self {
        Self {
            block_id: o.block_id.saturating_to(),
            l2_block_hash: o.l2_block_hash,
            l1_block_height: o.l1_block_height.saturating_to(),
            l1_block_hash: o.l1_block_hash,
        }
    }
}

/// Turns a mined rollup log into a typed event. Pending logs yield `None`.
fn decode_log(log: &Log) -> Option<Result<ChainEvent>> {
    if log.removed {
        return None;
    }
    let origin = EventOrigin {
        block_number: log.block_number?,
        block_hash: log.block_hash?,
        tx_hash: log.transaction_hash?,
        log_index: log.log_index?,
    };
    Some(bindings::decode_event(
        log.inner.data.topics(),
        &log.inner.data.data,
        origin,
    ))
}

/// Chain state queries the prover depends on.
#[async_trait]
pub trait ProverRpc: Send + Sync {
    /// Blocks until the L2 execution engine reports it is synced.
    async fn wait_till_l2_synced(&self, shutdown_token: &CancellationToken) -> Result<()>;

    /// Reads the rollup contract's state variables.
    async fn protocol_state_variables(&self) -> Result<ProtocolStateVariables>;

    /// Reads the protocol tier catalog.
    async fn tiers(&self) -> Result<Vec<Tier>>;

    /// Returns the L1 origin of an L2 block, or [`Error::NotFound`] if not indexed.
    async fn l1_origin_by_id(&self, block_id: u64) -> Result<L1Origin>;

    /// Returns an L1 header by number, or the head when `number` is `None`.
    async fn l1_header_by_number(&self, number: Option<u64>) -> Result<L1Header>;

    /// Returns an L1 header by hash.
    async fn l1_header_by_hash(&self, hash: B256) -> Result<L1Header>;

    /// Returns an L2 header by number.
    async fn l2_header_by_number(&self, number: u64) -> Result<L2Header>;

    /// Returns the on-chain transition of a block, or `None` if none was submitted.
    async fn transition(&self, block_id: u64, parent_hash: B256)
    -> Result<Option<TransitionState>>;

    /// Returns the `BlockProposed` event of a block.
    async fn block_proposed_event(&self, block_id: u64) -> Result<BlockProposedEvent>;

    /// Returns the rollup contract events of `kind` emitted in `[from, to]`, in log order.
    async fn events(&self, kind: EventKind, from: u64, to: u64) -> Result<Vec<ChainEvent>>;

    /// Reads the bond token allowance of `owner` for `spender`.
    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256>;

    /// Builds a bond token approval transaction.
    fn approve_tx(&self, opts: &TxOptions, spender: Address, amount: U256) -> TxCandidate;
}

/// [`ProverRpc`] backed by L1 and L2 JSON-RPC nodes.
#[derive(Debug, Clone)]
pub struct HttpRpcClient {
    l1: JsonRpcClient,
    l2: JsonRpcClient,
    rollup: Address,
    tier_provider: Address,
    bond_token: Address,
    sync_poll_interval: Duration,
}

impl HttpRpcClient {
    /// Create a new client.
    pub fn new(
        l1_url: Url,
        l2_url: Url,
        rollup: Address,
        tier_provider: Address,
        bond_token: Address,
    ) -> Self {
        Self {
            l1: JsonRpcClient::new(l1_url),
            l2: JsonRpcClient::new(l2_url),
            rollup,
            tier_provider,
            bond_token,
            sync_poll_interval: Duration::from_secs(12),
        }
    }

    /// Return the L1 JSON-RPC client.
    pub fn l1(&self) -> &JsonRpcClient {
        &self.l1
    }

    /// Returns `true` when the L2 node reports it is not syncing.
    async fn l2_synced(&self) -> Result<bool> {
        let status: serde_json::Value = self.l2.request_some("eth_syncing", ()).await?;
        Ok(status == serde_json::Value::Bool(false))
    }
}

#[async_trait]
impl ProverRpc for HttpRpcClient {
    async fn wait_till_l2_synced(&self, shutdown_token: &CancellationToken) -> Result<()> {
        loop {
            if self.l2_synced().await? {
                return Ok(());
            }
            info!(url = %self.l2.url(), "Waiting for L2 execution engine to sync");
            tokio::select! {
                biased;
                _ = shutdown_token.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(self.sync_poll_interval) => {}
            }
        }
    }

    async fn protocol_state_variables(&self) -> Result<ProtocolStateVariables> {
        let vars = self
            .l1
            .call(self.rollup, IRollupL1::getStateVariablesCall {})
            .await?;
        Ok(ProtocolStateVariables {
            genesis_height: vars.a.genesisHeight,
            genesis_timestamp: vars.a.genesisTimestamp,
            num_blocks: vars.b.numBlocks,
            last_verified_block_id: vars.b.lastVerifiedBlockId,
        })
    }

    async fn tiers(&self) -> Result<Vec<Tier>> {
        let ids = self
            .l1
            .call(self.tier_provider, ITierProvider::getTierIdsCall {})
            .await?;
        let mut tiers = Vec::with_capacity(ids.len());
        for id in ids {
            let info = self
                .l1
                .call(self.tier_provider, ITierProvider::getTierCall { tierId: id })
                .await?;
            tiers.push(bindings::tier_from_info(id, info));
        }
        Ok(tiers)
    }

    async fn l1_origin_by_id(&self, block_id: u64) -> Result<L1Origin> {
        let origin: Option<RpcL1Origin> = self
            .l2
            .request("taiko_l1OriginByID", (U256::from(block_id),))
            .await
            .map_err(|e| match e {
                Error::Rpc { message, .. } if message.contains("not found") => Error::NotFound,
                e => e,
            })?;
        origin.map(Into::into).ok_or(Error::NotFound)
    }

    async fn l1_header_by_number(&self, number: Option<u64>) -> Result<L1Header> {
        let tag = number.map_or(BlockNumberOrTag::Latest, BlockNumberOrTag::Number);
        let header: Header = self
            .l1
            .request_some("eth_getBlockByNumber", (tag, false))
            .await?;
        Ok(l1_header(header))
    }

    async fn l1_header_by_hash(&self, hash: B256) -> Result<L1Header> {
        let header: Header = self
            .l1
            .request_some("eth_getBlockByHash", (hash, false))
            .await?;
        Ok(l1_header(header))
    }

    async fn l2_header_by_number(&self, number: u64) -> Result<L2Header> {
        let header: Header = self
            .l2
            .request_some(
                "eth_getBlockByNumber",
                (BlockNumberOrTag::Number(number), false),
            )
            .await?;
        Ok(l2_header(header))
    }

    async fn transition(
        &self,
        block_id: u64,
        parent_hash: B256,
    ) -> Result<Option<TransitionState>> {
        let call = IRollupL1::getTransitionCall {
            blockId: block_id,
            parentHash: parent_hash,
        };
        match self.l1.call(self.rollup, call).await {
            Ok(state) => Ok(Some(state.into())),
            Err(Error::Rpc { code, message })
                if code == EXECUTION_REVERTED || message.contains("revert") =>
            {
                debug!(block_id, %parent_hash, "Transition does not exist");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn block_proposed_event(&self, block_id: u64) -> Result<BlockProposedEvent> {
        let block = self
            .l1
            .call(self.rollup, IRollupL1::getBlockCall { blockId: block_id })
            .await?;
        let proposed_in = block.blk.proposedIn;
        self.events(EventKind::BlockProposed, proposed_in, proposed_in)
            .await?
            .into_iter()
            .find_map(|event| match event {
                ChainEvent::BlockProposed(e) if e.block_id == block_id => Some(e),
                _ => None,
            })
            .ok_or(Error::NotFound)
    }

    async fn events(&self, kind: EventKind, from: u64, to: u64) -> Result<Vec<ChainEvent>> {
        let filter = Filter::new()
            .from_block(from)
            .to_block(to)
            .address(self.rollup)
            .event_signature(bindings::event_signature(kind));
        let logs: Vec<Log> = self
            .l1
            .request("eth_getLogs", (filter,))
            .await?
            .unwrap_or_default();

        logs.iter().filter_map(decode_log).collect()
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        self.l1
            .call(self.bond_token, IERC20::allowanceCall { owner, spender })
            .await
    }

    fn approve_tx(&self, opts: &TxOptions, spender: Address, amount: U256) -> TxCandidate {
        let data = IERC20::approveCall { spender, amount }.abi_encode();
        TxCandidate::new(opts, self.bond_token, data.into())
    }
}
