use async_trait::async_trait;
use rollup_prover_types::{ChainEvent, EventKind, ProofRequest, TransitionContestedEvent};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{ChainEventHandler, HandlerContext, WorkSenders, send_work};
use crate::{
    error::{Error, Result},
    registry::{next_tier_above, select_tier},
    tracker::{BlockState, WorkKey},
};

/// Defends contested transitions that match the local chain with a higher tier proof.
#[derive(Debug, Clone)]
pub struct TransitionContestedHandler {
    ctx: HandlerContext,
    senders: WorkSenders,
}

impl TransitionContestedHandler {
    pub fn new(ctx: HandlerContext, senders: WorkSenders) -> Self {
        Self { ctx, senders }
    }

    async fn proof_for(
        &self,
        event: &TransitionContestedEvent,
        shutdown_token: &CancellationToken,
    ) -> Result<Option<ProofRequest>> {
        let block_id = event.block_id;

        if event.contester == self.ctx.config.prover_address {
            debug!(block_id, "Skipping own contest");
            return Ok(None);
        }
        if self.ctx.is_verified(block_id, shutdown_token).await? {
            debug!(block_id, "Skipping verified block");
            return Ok(None);
        }

        let local = self.ctx.l2_header(block_id, shutdown_token).await?;
        if local.hash != event.transition.block_hash
            || local.state_root != event.transition.state_root
        {
            debug!(block_id, "Contested transition disagrees with local chain, leaving it");
            return Ok(None);
        }

        let tier_ids = self.ctx.tier_ids();
        let tier = if self.ctx.config.guardian {
            select_tier(&tier_ids, event.tier, true)
        } else {
            next_tier_above(&tier_ids, event.tier)
        };
        let Some(tier) = tier else {
            warn!(block_id, tier = event.tier, "No tier above the contested one");
            return Ok(None);
        };

        let proposed = self.ctx.proposed_event(block_id, shutdown_token).await?;
        Ok(Some(ProofRequest {
            block_id,
            tier,
            meta: proposed.meta,
        }))
    }
}

#[async_trait]
impl ChainEventHandler for TransitionContestedHandler {
    fn kind(&self) -> EventKind {
        EventKind::TransitionContested
    }

    async fn handle(&self, event: ChainEvent, shutdown_token: &CancellationToken) -> Result<()> {
        let ChainEvent::TransitionContested(event) = event else {
            return Err(Error::UnexpectedEvent(event.kind()));
        };
        let Some(request) = self.proof_for(&event, shutdown_token).await? else {
            self.ctx
                .tracker
                .set_state(event.block_id, BlockState::Contested)
                .await;
            return Ok(());
        };

        let key = WorkKey::Defence {
            contested_tier: event.tier,
            block_hash: event.transition.block_hash,
        };
        if !self
            .ctx
            .tracker
            .claim(request.block_id, key, BlockState::ProofRequested)
            .await
        {
            debug!(block_id = request.block_id, tier = event.tier, "Contest already answered");
            return Ok(());
        }
        info!(
            block_id = request.block_id,
            contested_tier = event.tier,
            tier = request.tier,
            "Defending contested transition"
        );
        send_work(&self.senders.proof_submission, request, "proof submission").await
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, B256};
    use rollup_prover_types::Transition;

    use super::*;
    use crate::{
        handler::{WorkReceivers, test_support::{config, context}, work_channels},
        test_utils::{FakeRpc, ME, l2_header, proposed},
    };

    const OTHER: Address = Address::new([0x07; 20]);

    fn setup(tiers: &[u16]) -> (TransitionContestedHandler, WorkReceivers) {
        let rpc = FakeRpc::new().with_l2_chain(10).with(|chain| {
            chain
                .events
                .push(ChainEvent::BlockProposed(proposed(6, OTHER, 100)));
        });
        let (senders, receivers) = work_channels(4);
        (
            TransitionContestedHandler::new(context(rpc, tiers, config()), senders),
            receivers,
        )
    }

    fn contested(contester: Address, block_hash: B256) -> ChainEvent {
        ChainEvent::TransitionContested(TransitionContestedEvent {
            block_id: 6,
            transition: Transition {
                parent_hash: l2_header(5).hash,
                block_hash,
                state_root: l2_header(6).state_root,
                graffiti: B256::ZERO,
            },
            contester,
            tier: 100,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_matching_transition_is_defended_with_next_tier() {
        let (handler, mut receivers) = setup(&[100, 200, 1000]);
        handler
            .handle(contested(OTHER, l2_header(6).hash), &CancellationToken::new())
            .await
            .unwrap();

        let request = receivers.proof_submission.try_recv().unwrap();
        assert_eq!(request.block_id, 6);
        assert_eq!(request.tier, 200);
        assert_eq!(
            handler.ctx.tracker.state(6).await,
            Some(BlockState::ProofRequested)
        );
    }

    #[tokio::test]
    async fn test_redelivered_contest_is_answered_once() {
        let (handler, mut receivers) = setup(&[100, 200, 1000]);
        let token = CancellationToken::new();
        let event = contested(OTHER, l2_header(6).hash);

        handler.handle(event.clone(), &token).await.unwrap();
        handler.handle(event, &token).await.unwrap();

        assert_eq!(receivers.proof_submission.try_recv().unwrap().tier, 200);
        assert!(receivers.proof_submission.try_recv().is_err());
        assert_eq!(
            handler.ctx.tracker.state(6).await,
            Some(BlockState::ProofRequested)
        );
    }

    #[tokio::test]
    async fn test_ignored_contests() {
        let token = CancellationToken::new();

        let (handler, mut receivers) = setup(&[100, 200]);
        handler
            .handle(contested(ME, l2_header(6).hash), &token)
            .await
            .unwrap();
        handler
            .handle(contested(OTHER, B256::repeat_byte(0xcc)), &token)
            .await
            .unwrap();
        assert!(receivers.proof_submission.try_recv().is_err());
        assert_eq!(handler.ctx.tracker.state(6).await, Some(BlockState::Contested));

        let (handler, mut receivers) = setup(&[100]);
        handler
            .handle(contested(OTHER, l2_header(6).hash), &token)
            .await
            .unwrap();
        assert!(receivers.proof_submission.try_recv().is_err());
    }
}
