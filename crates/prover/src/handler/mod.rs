//! Handlers of L1 events and assignment expiries.
//!
//! Each handler turns one event into zero or more work items pushed onto the
//! channels consumed by the submission services:
//!
//! ```text
//!  BlockProposed ──────────┬──► proof generation ──┐
//!                          └──► assignment expired ─┼─► AssignmentExpired ─┐
//!  TransitionProved ──────────► proof contest       │                      │
//!  TransitionContested ───────► proof submission ◄──┴──────────────────────┘
//!  BlockVerified ─────────────► (tracker only)
//! ```

mod assignment_expired;
mod block_proposed;
mod block_verified;
mod guardian;
mod transition_contested;
mod transition_proved;

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use alloy_primitives::Address;
use async_trait::async_trait;
use rollup_prover_types::{
    BlockProposedEvent, ChainEvent, ContestRequest, EventKind, L2Header, ProofRequest,
    ProofStatus, TierId,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use assignment_expired::AssignmentExpiredHandler;
pub use block_proposed::{BlockProposedHandler, Decision};
pub use block_verified::BlockVerifiedHandler;
pub use guardian::GuardianBlockProposedHandler;
pub use transition_contested::TransitionContestedHandler;
pub use transition_proved::TransitionProvedHandler;

use crate::{
    error::{Error, Result},
    retry::{RetryPolicy, retry_rpc},
    rpc::ProverRpc,
    state::SharedState,
    tracker::BlockTracker,
};

/// Grace period added to a proving window before the assignment counts as expired.
pub const EXPIRY_GRACE: Duration = Duration::from_secs(60);

/// Settings shared by every handler variant.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub prover_address: Address,
    pub contester_mode: bool,
    pub prove_unassigned_blocks: bool,
    pub guardian: bool,
    pub retry: RetryPolicy,
}

/// Collaborators shared by every handler.
#[derive(Clone)]
pub struct HandlerContext {
    pub rpc: Arc<dyn ProverRpc>,
    pub state: Arc<SharedState>,
    pub tracker: Arc<BlockTracker>,
    pub config: HandlerConfig,
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HandlerContext {
    /// Tier ids of the protocol catalog, in escalation order.
    pub fn tier_ids(&self) -> Vec<TierId> {
        self.state.tiers().iter().map(|t| t.id).collect()
    }

    /// Returns `true` if the block is already verified on L1.
    pub async fn is_verified(
        &self,
        block_id: u64,
        shutdown_token: &CancellationToken,
    ) -> Result<bool> {
        if block_id <= self.tracker.last_verified().await {
            return Ok(true);
        }
        let vars = retry_rpc(&self.config.retry, shutdown_token, "state variables", || {
            self.rpc.protocol_state_variables()
        })
        .await?;
        Ok(block_id <= vars.last_verified_block_id)
    }

    /// Looks up the proof status of a block against the local L2 chain.
    pub async fn proof_status(
        &self,
        block_id: u64,
        shutdown_token: &CancellationToken,
    ) -> Result<ProofStatus> {
        retry_rpc(&self.config.retry, shutdown_token, "proof status", || {
            proof_status(self.rpc.as_ref(), block_id)
        })
        .await
    }

    /// Reads the local L2 header of a block, retrying until it is available.
    pub async fn l2_header(
        &self,
        block_id: u64,
        shutdown_token: &CancellationToken,
    ) -> Result<L2Header> {
        retry_rpc(&self.config.retry, shutdown_token, "l2 header", || {
            self.rpc.l2_header_by_number(block_id)
        })
        .await
    }

    /// Reads the `BlockProposed` event of a block.
    pub async fn proposed_event(
        &self,
        block_id: u64,
        shutdown_token: &CancellationToken,
    ) -> Result<BlockProposedEvent> {
        retry_rpc(&self.config.retry, shutdown_token, "block proposed event", || {
            self.rpc.block_proposed_event(block_id)
        })
        .await
    }
}

/// Proof status of a block: whether a transition was submitted for its local parent,
/// and whether that transition matches the local chain.
pub async fn proof_status(rpc: &dyn ProverRpc, block_id: u64) -> Result<ProofStatus> {
    let parent = rpc.l2_header_by_number(block_id.saturating_sub(1)).await?;
    let Some(transition) = rpc.transition(block_id, parent.hash).await? else {
        return Ok(ProofStatus::not_submitted(parent));
    };
    let local = rpc.l2_header_by_number(block_id).await?;
    Ok(ProofStatus::from_transition(transition, parent, &local))
}

/// Unix time at which the assignment of a block expires.
pub fn assignment_expiry(proposed_at: u64, proving_window: Duration) -> u64 {
    proposed_at + proving_window.as_secs() + EXPIRY_GRACE.as_secs()
}

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Handles one kind of L1 event.
#[async_trait]
pub trait ChainEventHandler: Send + Sync {
    /// Kind of events this handler accepts.
    fn kind(&self) -> EventKind;

    /// Handles one event. Errors leave the event to be delivered again.
    async fn handle(&self, event: ChainEvent, shutdown_token: &CancellationToken) -> Result<()>;
}

/// Senders of the work channels fed by the handlers.
#[derive(Debug, Clone)]
pub struct WorkSenders {
    pub proof_generation: mpsc::Sender<ProofRequest>,
    pub proof_submission: mpsc::Sender<ProofRequest>,
    pub proof_contest: mpsc::Sender<ContestRequest>,
    pub assignment_expired: mpsc::Sender<BlockProposedEvent>,
}

/// Receivers of the work channels, consumed by the submission services.
#[derive(Debug)]
pub struct WorkReceivers {
    pub proof_generation: mpsc::Receiver<ProofRequest>,
    pub proof_submission: mpsc::Receiver<ProofRequest>,
    pub proof_contest: mpsc::Receiver<ContestRequest>,
    pub assignment_expired: mpsc::Receiver<BlockProposedEvent>,
}

/// Creates the work channels, each holding up to `capacity` items.
pub fn work_channels(capacity: usize) -> (WorkSenders, WorkReceivers) {
    let (proof_generation_tx, proof_generation_rx) = mpsc::channel(capacity);
    let (proof_submission_tx, proof_submission_rx) = mpsc::channel(capacity);
    let (proof_contest_tx, proof_contest_rx) = mpsc::channel(capacity);
    let (assignment_expired_tx, assignment_expired_rx) = mpsc::channel(capacity);
    (
        WorkSenders {
            proof_generation: proof_generation_tx,
            proof_submission: proof_submission_tx,
            proof_contest: proof_contest_tx,
            assignment_expired: assignment_expired_tx,
        },
        WorkReceivers {
            proof_generation: proof_generation_rx,
            proof_submission: proof_submission_rx,
            proof_contest: proof_contest_rx,
            assignment_expired: assignment_expired_rx,
        },
    )
}

/// Sends a work item, mapping a closed channel to [`Error::ChannelClosed`].
pub(crate) async fn send_work<T>(
    tx: &mpsc::Sender<T>,
    item: T,
    channel: &'static str,
) -> Result<()> {
    tx.send(item).await.map_err(|_| Error::ChannelClosed(channel))
}


#[cfg(test)]
mod tests {
    use alloy_primitives::B256;

    use super::*;
    use crate::test_utils::{FakeRpc, l2_header, valid_transition};

    #[tokio::test]
    async fn test_proof_status_not_submitted() {
        let rpc = FakeRpc::new().with_l2_chain(5);
        let status = proof_status(&rpc, 3).await.unwrap();
        assert!(!status.is_submitted);
        assert_eq!(status.parent_header, l2_header(2));
    }

    #[tokio::test]
    async fn test_proof_status_detects_invalid_transition() {
        let rpc = FakeRpc::new().with_l2_chain(5).with(|chain| {
            let mut transition = valid_transition(3, Address::ZERO, 100);
            transition.state_root = B256::repeat_byte(0xde);
            chain.transitions.insert((3, l2_header(2).hash), transition);
        });
        let status = proof_status(&rpc, 3).await.unwrap();
        assert!(status.is_submitted);
        assert!(status.invalid);
    }

    #[tokio::test]
    async fn test_proof_status_missing_l2_block_is_not_found() {
        let rpc = FakeRpc::new().with_l2_chain(1);
        assert!(matches!(proof_status(&rpc, 3).await, Err(Error::NotFound)));
    }

    #[test]
    fn test_assignment_expiry_adds_grace() {
        assert_eq!(assignment_expiry(1_000, Duration::from_secs(3_600)), 4_660);
    }
}
