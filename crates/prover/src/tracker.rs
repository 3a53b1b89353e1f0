//! Per-block lifecycle bookkeeping.

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
};

use alloy_primitives::B256;
use rollup_prover_types::TierId;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lifecycle state of a proposed block, from this prover's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockState {
    /// Seen, no work scheduled yet.
    Proposed,
    /// A proof request was enqueued.
    ProofRequested,
    /// A contest of the current transition was enqueued.
    ContestRequested,
    /// Our proof or contest was confirmed on L1.
    Proved,
    /// The current transition was contested.
    Contested,
    /// Finalized. Terminal.
    Verified,
    /// The proving window lapsed and nothing is left to do. Terminal.
    ExpiredAndDropped,
}

impl BlockState {
    /// Returns `true` for states no event can leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified | Self::ExpiredAndDropped)
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Work enqueued for a block, keyed by the transition it targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkKey {
    /// Contest of the on-chain transition claiming `block_hash`.
    Contest { block_hash: B256 },
    /// Higher tier proof of the transition claiming `block_hash`, contested at
    /// `contested_tier`.
    Defence {
        contested_tier: TierId,
        block_hash: B256,
    },
}

#[derive(Debug)]
struct TrackedBlock {
    state: BlockState,
    /// Hash of the L1 block the proposal was seen in.
    proposed_in: Option<B256>,
    expiry: Option<CancellationToken>,
    claimed: HashSet<WorkKey>,
}

impl TrackedBlock {
    fn new() -> Self {
        Self {
            state: BlockState::Proposed,
            proposed_in: None,
            expiry: None,
            claimed: HashSet::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    blocks: BTreeMap<u64, TrackedBlock>,
    last_verified: u64,
}

/// Tracks every block the prover has seen until it is verified.
#[derive(Debug, Default)]
pub struct BlockTracker {
    inner: Mutex<Inner>,
}

impl BlockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the state of a block, or `None` if it was never seen.
    pub async fn state(&self, block_id: u64) -> Option<BlockState> {
        let inner = self.inner.lock().await;
        if block_id != 0 && block_id <= inner.last_verified {
            return Some(BlockState::Verified);
        }
        inner.blocks.get(&block_id).map(|b| b.state)
    }

    /// Returns `true` if the proposal was already recorded, or the block is verified.
    pub async fn is_known_proposal(&self, block_id: u64, proposed_in: B256) -> bool {
        let inner = self.inner.lock().await;
        block_id <= inner.last_verified
            || inner
                .blocks
                .get(&block_id)
                .is_some_and(|b| b.proposed_in == Some(proposed_in))
    }

    /// Records a proposal seen in L1 block `proposed_in`.
    ///
    /// Returns `true` if the proposal is new: never seen, or seen in another L1 block
    /// after a reorg. A re-proposed block starts over from [`BlockState::Proposed`].
    pub async fn observe_proposal(&self, block_id: u64, proposed_in: B256) -> bool {
        let mut inner = self.inner.lock().await;
        if block_id <= inner.last_verified {
            return false;
        }
        let block = inner.blocks.entry(block_id).or_insert_with(TrackedBlock::new);
        if block.proposed_in == Some(proposed_in) {
            return false;
        }
        if block.proposed_in.is_some() {
            debug!(block_id, %proposed_in, "Block re-proposed");
            if let Some(expiry) = block.expiry.take() {
                expiry.cancel();
            }
            block.state = BlockState::Proposed;
            block.claimed.clear();
        }
        block.proposed_in = Some(proposed_in);
        true
    }

    /// Moves a block to `state`. Terminal states are never left.
    ///
    /// Returns `false` if the transition was refused.
    pub async fn set_state(&self, block_id: u64, state: BlockState) -> bool {
        let mut inner = self.inner.lock().await;
        if block_id <= inner.last_verified {
            return false;
        }
        let block = inner.blocks.entry(block_id).or_insert_with(TrackedBlock::new);
        if block.state.is_terminal() {
            return false;
        }
        debug!(block_id, from = %block.state, to = %state, "Block state changed");
        block.state = state;
        if state.is_terminal() {
            if let Some(expiry) = block.expiry.take() {
                expiry.cancel();
            }
        }
        true
    }

    /// Claims `key` for a block and moves it to `state`.
    ///
    /// Returns `false` if the work was already claimed or the block is verified or
    /// dropped. Claims are forgotten when the block is re-proposed.
    pub async fn claim(&self, block_id: u64, key: WorkKey, state: BlockState) -> bool {
        let mut inner = self.inner.lock().await;
        if block_id <= inner.last_verified {
            return false;
        }
        let block = inner.blocks.entry(block_id).or_insert_with(TrackedBlock::new);
        if block.state.is_terminal() || !block.claimed.insert(key) {
            return false;
        }
        debug!(block_id, ?key, from = %block.state, to = %state, "Work claimed");
        block.state = state;
        true
    }

    /// Registers the expiry timer of a block, cancelling any previous one.
    pub async fn set_expiry(&self, block_id: u64, timer: CancellationToken) {
        let mut inner = self.inner.lock().await;
        let block = inner.blocks.entry(block_id).or_insert_with(TrackedBlock::new);
        if let Some(previous) = block.expiry.replace(timer) {
            previous.cancel();
        }
    }

    /// Forgets the expiry timer of a block after it fired.
    pub async fn clear_expiry(&self, block_id: u64) {
        if let Some(block) = self.inner.lock().await.blocks.get_mut(&block_id) {
            block.expiry = None;
        }
    }

    /// Returns `true` if a live expiry timer is registered for the block.
    pub async fn has_expiry(&self, block_id: u64) -> bool {
        self.inner
            .lock()
            .await
            .blocks
            .get(&block_id)
            .is_some_and(|b| b.expiry.as_ref().is_some_and(|t| !t.is_cancelled()))
    }

    /// Marks every block up to `block_id` verified, cancelling their timers.
    ///
    /// Returns the number of tracked blocks cleared.
    pub async fn verify_up_to(&self, block_id: u64) -> usize {
        let mut inner = self.inner.lock().await;
        if block_id <= inner.last_verified {
            return 0;
        }
        inner.last_verified = block_id;
        let pending = inner.blocks.split_off(&(block_id + 1));
        let verified = std::mem::replace(&mut inner.blocks, pending);
        for block in verified.values() {
            if let Some(expiry) = &block.expiry {
                expiry.cancel();
            }
        }
        verified.len()
    }

    /// Returns the highest verified block id seen.
    pub async fn last_verified(&self) -> u64 {
        self.inner.lock().await.last_verified
    }

    /// Cancels every pending expiry timer.
    pub async fn cancel_all(&self) {
        for block in self.inner.lock().await.blocks.values_mut() {
            if let Some(expiry) = block.expiry.take() {
                expiry.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_terminal_states_are_final() {
        let tracker = BlockTracker::new();
        assert!(tracker.set_state(1, BlockState::ProofRequested).await);
        assert!(tracker.set_state(1, BlockState::ExpiredAndDropped).await);
        assert!(!tracker.set_state(1, BlockState::ProofRequested).await);
        assert_eq!(tracker.state(1).await, Some(BlockState::ExpiredAndDropped));
    }

    #[tokio::test]
    async fn test_verify_clears_blocks_and_timers() {
        let tracker = BlockTracker::new();
        let timer_2 = CancellationToken::new();
        let timer_5 = CancellationToken::new();
        tracker.set_state(2, BlockState::Proposed).await;
        tracker.set_expiry(2, timer_2.clone()).await;
        tracker.set_state(5, BlockState::Proposed).await;
        tracker.set_expiry(5, timer_5.clone()).await;

        assert_eq!(tracker.verify_up_to(3).await, 1);
        assert!(timer_2.is_cancelled());
        assert!(!timer_5.is_cancelled());
        assert_eq!(tracker.state(2).await, Some(BlockState::Verified));
        assert_eq!(tracker.state(5).await, Some(BlockState::Proposed));
        assert!(!tracker.set_state(3, BlockState::ProofRequested).await);

        assert_eq!(tracker.verify_up_to(2).await, 0);
        assert_eq!(tracker.last_verified().await, 3);
    }

    #[tokio::test]
    async fn test_observe_proposal_is_keyed_by_origin() {
        let tracker = BlockTracker::new();
        assert!(!tracker.is_known_proposal(4, B256::repeat_byte(1)).await);
        assert!(tracker.observe_proposal(4, B256::repeat_byte(1)).await);
        assert!(tracker.is_known_proposal(4, B256::repeat_byte(1)).await);
        assert!(!tracker.observe_proposal(4, B256::repeat_byte(1)).await);

        tracker.set_state(4, BlockState::ProofRequested).await;
        assert!(tracker.observe_proposal(4, B256::repeat_byte(2)).await);
        assert_eq!(tracker.state(4).await, Some(BlockState::Proposed));

        tracker.verify_up_to(4).await;
        assert!(!tracker.observe_proposal(4, B256::repeat_byte(3)).await);
    }

    #[tokio::test]
    async fn test_work_is_claimed_once() {
        let tracker = BlockTracker::new();
        let contest = WorkKey::Contest {
            block_hash: B256::repeat_byte(0xbb),
        };
        let defence = WorkKey::Defence {
            contested_tier: 100,
            block_hash: B256::repeat_byte(0xbb),
        };

        assert!(tracker.claim(4, contest, BlockState::ContestRequested).await);
        assert!(!tracker.claim(4, contest, BlockState::ContestRequested).await);
        assert_eq!(tracker.state(4).await, Some(BlockState::ContestRequested));

        assert!(tracker.claim(4, defence, BlockState::ProofRequested).await);
        assert!(!tracker.claim(4, defence, BlockState::ProofRequested).await);
        assert!(
            tracker
                .claim(
                    4,
                    WorkKey::Defence {
                        contested_tier: 200,
                        block_hash: B256::repeat_byte(0xbb),
                    },
                    BlockState::ProofRequested,
                )
                .await
        );

        // A reorg forgets the claims of the old proposal.
        tracker.observe_proposal(4, B256::repeat_byte(1)).await;
        tracker.observe_proposal(4, B256::repeat_byte(2)).await;
        assert!(tracker.claim(4, contest, BlockState::ContestRequested).await);

        tracker.verify_up_to(4).await;
        assert!(!tracker.claim(4, defence, BlockState::ProofRequested).await);
    }

    #[tokio::test]
    async fn test_new_expiry_replaces_previous() {
        let tracker = BlockTracker::new();
        let first = CancellationToken::new();
        tracker.set_expiry(1, first.clone()).await;
        tracker.set_expiry(1, CancellationToken::new()).await;
        assert!(first.is_cancelled());
        assert!(tracker.has_expiry(1).await);

        tracker.cancel_all().await;
        assert!(!tracker.has_expiry(1).await);
    }
}
