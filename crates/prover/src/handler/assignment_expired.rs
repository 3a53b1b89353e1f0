use rollup_prover_types::{BlockProposedEvent, ContestRequest, ProofRequest};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{HandlerContext, WorkSenders, send_work};
use crate::{
    error::Result,
    registry::select_tier,
    tracker::{BlockState, WorkKey},
};

/// Re-examines a block once its assigned prover's window lapsed.
#[derive(Debug, Clone)]
pub struct AssignmentExpiredHandler {
    ctx: HandlerContext,
    senders: WorkSenders,
}

impl AssignmentExpiredHandler {
    pub fn new(ctx: HandlerContext, senders: WorkSenders) -> Self {
        Self { ctx, senders }
    }

    pub async fn handle(
        &self,
        event: BlockProposedEvent,
        shutdown_token: &CancellationToken,
    ) -> Result<()> {
        let block_id = event.block_id;
        self.ctx.tracker.clear_expiry(block_id).await;

        if self.ctx.is_verified(block_id, shutdown_token).await? {
            debug!(block_id, "Expired block already verified");
            return Ok(());
        }

        let status = self.ctx.proof_status(block_id, shutdown_token).await?;
        let config = &self.ctx.config;

        if status.is_submitted && !status.invalid {
            debug!(block_id, "Expired block already proven");
            return self.drop_block(block_id).await;
        }

        if status.is_submitted {
            if config.contester_mode && !config.guardian {
                let (tier, block_hash) = status
                    .current_transition
                    .as_ref()
                    .map(|t| (t.tier, t.block_hash))
                    .unwrap_or((event.meta.min_tier, Default::default()));
                let key = WorkKey::Contest { block_hash };
                if !self
                    .ctx
                    .tracker
                    .claim(block_id, key, BlockState::ContestRequested)
                    .await
                {
                    debug!(block_id, "Contest of expired block already requested");
                    return Ok(());
                }
                info!(block_id, tier, "Contesting transition of expired block");
                let request = ContestRequest {
                    block_id,
                    proposed_in: event.meta.l1_height,
                    parent_hash: status.parent_header.hash,
                    meta: event.meta,
                    tier,
                };
                return send_work(&self.senders.proof_contest, request, "proof contest").await;
            }
            if !config.guardian {
                return self.drop_block(block_id).await;
            }
        } else if !config.prove_unassigned_blocks {
            return self.drop_block(block_id).await;
        }

        let Some(tier) = select_tier(&self.ctx.tier_ids(), event.meta.min_tier, config.guardian)
        else {
            debug!(block_id, "No eligible tier for expired block");
            return self.drop_block(block_id).await;
        };

        info!(block_id, tier, "Proving block after assignment expiry");
        self.ctx
            .tracker
            .set_state(block_id, BlockState::ProofRequested)
            .await;
        let request = ProofRequest {
            block_id,
            tier,
            meta: event.meta,
        };
        send_work(&self.senders.proof_submission, request, "proof submission").await
    }

    async fn drop_block(&self, block_id: u64) -> Result<()> {
        self.ctx
            .tracker
            .set_state(block_id, BlockState::ExpiredAndDropped)
            .await;
        Ok(())
    }
}
