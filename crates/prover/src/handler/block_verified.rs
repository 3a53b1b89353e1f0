use async_trait::async_trait;
use rollup_prover_types::{ChainEvent, EventKind};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{ChainEventHandler, HandlerContext};
use crate::error::{Error, Result};

/// Finalizes every tracked block up to the verified one.
#[derive(Debug, Clone)]
pub struct BlockVerifiedHandler {
    ctx: HandlerContext,
}

impl BlockVerifiedHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ChainEventHandler for BlockVerifiedHandler {
    fn kind(&self) -> EventKind {
        EventKind::BlockVerified
    }

    async fn handle(&self, event: ChainEvent, _shutdown_token: &CancellationToken) -> Result<()> {
        let ChainEvent::BlockVerified(event) = event else {
            return Err(Error::UnexpectedEvent(event.kind()));
        };
        let finalized = self.ctx.tracker.verify_up_to(event.block_id).await;
        info!(
            block_id = event.block_id,
            prover = %event.prover,
            tier = event.tier,
            finalized,
            "Block verified"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;
    use rollup_prover_types::BlockVerifiedEvent;

    use super::*;
    use crate::{
        handler::test_support::{config, context},
        test_utils::FakeRpc,
        tracker::BlockState,
    };

    #[tokio::test]
    async fn test_verification_finalizes_tracked_blocks() {
        let handler = BlockVerifiedHandler::new(context(FakeRpc::new(), &[100], config()));
        let tracker = handler.ctx.tracker.clone();
        tracker.observe_proposal(1, B256::repeat_byte(1)).await;
        tracker.observe_proposal(2, B256::repeat_byte(2)).await;
        tracker.observe_proposal(3, B256::repeat_byte(3)).await;

        let event = ChainEvent::BlockVerified(BlockVerifiedEvent {
            block_id: 2,
            ..Default::default()
        });
        handler.handle(event, &CancellationToken::new()).await.unwrap();

        assert_eq!(tracker.last_verified().await, 2);
        assert_eq!(tracker.state(2).await, Some(BlockState::Verified));
        assert_eq!(tracker.state(3).await, Some(BlockState::Proposed));
        assert!(!tracker.set_state(1, BlockState::Proved).await);
    }

    #[tokio::test]
    async fn test_rejects_other_events() {
        let handler = BlockVerifiedHandler::new(context(FakeRpc::new(), &[100], config()));
        let event = ChainEvent::BlockProposed(Default::default());
        assert!(matches!(
            handler.handle(event, &CancellationToken::new()).await,
            Err(Error::UnexpectedEvent(EventKind::BlockProposed))
        ));
    }
}
