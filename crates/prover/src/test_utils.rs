//! In-memory fakes shared by unit tests.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Mutex,
    time::Duration,
};

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use rollup_prover_types::{
    BlockMetadata, BlockProposedEvent, ChainEvent, EventKind, EventOrigin, L1Header, L1Origin,
    L2Header, ProtocolStateVariables, Tier, TierId, TransitionState,
};
use tokio_util::sync::CancellationToken;

use crate::{
    bindings::IERC20,
    error::{Error, Result},
    rpc::ProverRpc,
    sender::{TxCandidate, TxOptions},
};

pub const BOND_TOKEN: Address = Address::new([0xb0; 20]);
pub const ROLLUP: Address = Address::new([0xa1; 20]);
pub const ME: Address = Address::new([0x0e; 20]);

/// Mutable chain state behind a [`FakeRpc`].
#[derive(Debug, Default)]
pub struct FakeChain {
    pub state_vars: ProtocolStateVariables,
    pub tiers: Vec<Tier>,
    pub l1_headers: BTreeMap<u64, L1Header>,
    pub l1_origins: HashMap<u64, L1Origin>,
    /// When set, origin lookups fail with this RPC code.
    pub l1_origin_error: Option<i64>,
    pub l2_headers: BTreeMap<u64, L2Header>,
    pub transitions: HashMap<(u64, B256), TransitionState>,
    pub events: Vec<ChainEvent>,
    pub allowance: U256,
    /// Allowance reads failing with a transient error before succeeding.
    pub allowance_failures: u32,
    pub allowance_reads: u32,
}

/// [`ProverRpc`] serving a [`FakeChain`].
#[derive(Debug, Default)]
pub struct FakeRpc {
    pub chain: Mutex<FakeChain>,
}

impl FakeRpc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, f: impl FnOnce(&mut FakeChain)) -> Self {
        f(&mut self.chain.lock().unwrap());
        self
    }

    pub fn update(&self, f: impl FnOnce(&mut FakeChain)) {
        f(&mut self.chain.lock().unwrap());
    }

    /// Adds L1 headers `0..=head`.
    pub fn with_l1_chain(self, head: u64) -> Self {
        self.with(|chain| {
            for n in 0..=head {
                chain.l1_headers.insert(n, l1_header(n));
            }
        })
    }

    /// Adds L2 headers `0..=head`.
    pub fn with_l2_chain(self, head: u64) -> Self {
        self.with(|chain| {
            for n in 0..=head {
                chain.l2_headers.insert(n, l2_header(n));
            }
        })
    }
}

pub fn l1_header(number: u64) -> L1Header {
    L1Header {
        number,
        hash: B256::from(U256::from(0x1000 + number)),
        parent_hash: B256::from(U256::from(0x1000 + number.saturating_sub(1))),
        timestamp: 1_000 + number * 12,
    }
}

pub fn l2_header(number: u64) -> L2Header {
    L2Header {
        number,
        hash: B256::from(U256::from(0x2000 + number)),
        parent_hash: B256::from(U256::from(0x2000 + number.saturating_sub(1))),
        state_root: B256::from(U256::from(0x3000 + number)),
        timestamp: 2_000 + number * 2,
    }
}

pub fn tier(id: TierId) -> Tier {
    Tier::new(id, Duration::from_secs(3_600))
}

pub fn proposed(block_id: u64, assigned_prover: Address, min_tier: TierId) -> BlockProposedEvent {
    BlockProposedEvent {
        block_id,
        assigned_prover,
        liveness_bond: U256::ZERO,
        meta: BlockMetadata {
            id: block_id,
            timestamp: 0,
            l1_height: 10 + block_id,
            min_tier,
            ..Default::default()
        },
        origin: EventOrigin {
            block_number: 10 + block_id,
            block_hash: l1_header(10 + block_id).hash,
            ..Default::default()
        },
    }
}

/// A transition matching [`l2_header`], submitted by `prover`.
pub fn valid_transition(block_id: u64, prover: Address, tier: TierId) -> TransitionState {
    let header = l2_header(block_id);
    TransitionState {
        block_hash: header.hash,
        state_root: header.state_root,
        prover,
        tier,
        ..Default::default()
    }
}

#[async_trait]
impl ProverRpc for FakeRpc {
    async fn wait_till_l2_synced(&self, _shutdown_token: &CancellationToken) -> Result<()> {
        Ok(())
    }

    async fn protocol_state_variables(&self) -> Result<ProtocolStateVariables> {
        Ok(self.chain.lock().unwrap().state_vars.clone())
    }

    async fn tiers(&self) -> Result<Vec<Tier>> {
        Ok(self.chain.lock().unwrap().tiers.clone())
    }

    async fn l1_origin_by_id(&self, block_id: u64) -> Result<L1Origin> {
        let chain = self.chain.lock().unwrap();
        if let Some(code) = chain.l1_origin_error {
            return Err(Error::Rpc {
                code,
                message: "boom".to_string(),
            });
        }
        chain.l1_origins.get(&block_id).cloned().ok_or(Error::NotFound)
    }

    async fn l1_header_by_number(&self, number: Option<u64>) -> Result<L1Header> {
        let chain = self.chain.lock().unwrap();
        let header = match number {
            Some(n) => chain.l1_headers.get(&n),
            None => chain.l1_headers.values().next_back(),
        };
        header.cloned().ok_or(Error::NotFound)
    }

    async fn l1_header_by_hash(&self, hash: B256) -> Result<L1Header> {
        let chain = self.chain.lock().unwrap();
        chain
            .l1_headers
            .values()
            .find(|h| h.hash == hash)
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn l2_header_by_number(&self, number: u64) -> Result<L2Header> {
        let chain = self.chain.lock().unwrap();
        chain.l2_headers.get(&number).cloned().ok_or(Error::NotFound)
    }

    async fn transition(
        &self,
        block_id: u64,
        parent_hash: B256,
    ) -> Result<Option<TransitionState>> {
        let chain = self.chain.lock().unwrap();
        Ok(chain.transitions.get(&(block_id, parent_hash)).cloned())
    }

    async fn block_proposed_event(&self, block_id: u64) -> Result<BlockProposedEvent> {
        let chain = self.chain.lock().unwrap();
        chain
            .events
            .iter()
            .find_map(|event| match event {
                ChainEvent::BlockProposed(e) if e.block_id == block_id => Some(e.clone()),
                _ => None,
            })
            .ok_or(Error::NotFound)
    }

    async fn events(&self, kind: EventKind, from: u64, to: u64) -> Result<Vec<ChainEvent>> {
        let chain = self.chain.lock().unwrap();
        Ok(chain
            .events
            .iter()
            .filter(|e| e.kind() == kind)
            .filter(|e| (from..=to).contains(&e.origin().block_number))
            .cloned()
            .collect())
    }

    async fn allowance(&self, _owner: Address, _spender: Address) -> Result<U256> {
        let mut chain = self.chain.lock().unwrap();
        chain.allowance_reads += 1;
        if chain.allowance_failures > 0 {
            chain.allowance_failures -= 1;
            return Err(Error::Rpc {
                code: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(chain.allowance)
    }

    fn approve_tx(&self, opts: &TxOptions, spender: Address, amount: U256) -> TxCandidate {
        let data = IERC20::approveCall { spender, amount }.abi_encode();
        TxCandidate::new(opts, BOND_TOKEN, data.into())
    }
}
