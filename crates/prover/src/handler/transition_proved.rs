use async_trait::async_trait;
use rollup_prover_types::{
    ChainEvent, ContestRequest, EventKind, TIER_GUARDIAN_ID, TransitionProvedEvent,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ChainEventHandler, HandlerContext, WorkSenders, send_work};
use crate::{
    error::{Error, Result},
    tracker::{BlockState, WorkKey},
};

/// Watches proved transitions and contests those that disagree with the local chain.
///
/// Only active in contester mode.
#[derive(Debug, Clone)]
pub struct TransitionProvedHandler {
    ctx: HandlerContext,
    senders: WorkSenders,
}

impl TransitionProvedHandler {
    pub fn new(ctx: HandlerContext, senders: WorkSenders) -> Self {
        Self { ctx, senders }
    }

    /// Returns the contest to raise for `event`, if any.
    async fn contest_for(
        &self,
        event: &TransitionProvedEvent,
        shutdown_token: &CancellationToken,
    ) -> Result<Option<ContestRequest>> {
        let block_id = event.block_id;

        if event.prover == self.ctx.config.prover_address {
            debug!(block_id, "Skipping own transition");
            return Ok(None);
        }
        if event.tier == TIER_GUARDIAN_ID {
            debug!(block_id, "Guardian transitions cannot be contested");
            return Ok(None);
        }
        if self.ctx.is_verified(block_id, shutdown_token).await? {
            debug!(block_id, "Skipping verified block");
            return Ok(None);
        }
        if self.ctx.tracker.state(block_id).await == Some(BlockState::Contested) {
            debug!(block_id, "Block already contested");
            return Ok(None);
        }

        let local = self.ctx.l2_header(block_id, shutdown_token).await?;
        if local.hash == event.transition.block_hash
            && local.state_root == event.transition.state_root
        {
            debug!(block_id, tier = event.tier, "Proved transition matches local chain");
            return Ok(None);
        }

        warn!(
            block_id,
            tier = event.tier,
            prover = %event.prover,
            local_hash = %local.hash,
            proved_hash = %event.transition.block_hash,
            "Proved transition disagrees with local chain"
        );

        let proposed = self.ctx.proposed_event(block_id, shutdown_token).await?;
        Ok(Some(ContestRequest {
            block_id,
            proposed_in: proposed.meta.l1_height,
            parent_hash: event.transition.parent_hash,
            meta: proposed.meta,
            tier: event.tier,
        }))
    }
}

#[async_trait]
impl ChainEventHandler for TransitionProvedHandler {
    fn kind(&self) -> EventKind {
        EventKind::TransitionProved
    }

    async fn handle(&self, event: ChainEvent, shutdown_token: &CancellationToken) -> Result<()> {
        let ChainEvent::TransitionProved(event) = event else {
            return Err(Error::UnexpectedEvent(event.kind()));
        };
        if !self.ctx.config.contester_mode {
            return Ok(());
        }

        let Some(request) = self.contest_for(&event, shutdown_token).await? else {
            return Ok(());
        };
        let key = WorkKey::Contest {
            block_hash: event.transition.block_hash,
        };
        if !self
            .ctx
            .tracker
            .claim(request.block_id, key, BlockState::ContestRequested)
            .await
        {
            debug!(block_id = request.block_id, "Contest already requested");
            return Ok(());
        }
        info!(block_id = request.block_id, tier = request.tier, "Requesting contest");
        send_work(&self.senders.proof_contest, request, "proof contest").await
    }
}
