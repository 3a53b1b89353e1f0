use std::{fmt, sync::Arc};

use async_trait::async_trait;
use rollup_prover_types::{ChainEvent, EventKind};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{BlockProposedHandler, ChainEventHandler};
use crate::{
    error::{Error, Result},
    heartbeat::GuardianHeartbeater,
};

/// `BlockProposed` handler of a guardian prover.
///
/// Signs the local L2 block and reports it to the health check server before the
/// regular handling. Failing to report never blocks proving.
#[derive(Clone)]
pub struct GuardianBlockProposedHandler {
    inner: BlockProposedHandler,
    heartbeater: Arc<dyn GuardianHeartbeater>,
}

impl fmt::Debug for GuardianBlockProposedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardianBlockProposedHandler")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl GuardianBlockProposedHandler {
    pub fn new(inner: BlockProposedHandler, heartbeater: Arc<dyn GuardianHeartbeater>) -> Self {
        Self { inner, heartbeater }
    }

    async fn sign_block(&self, block_id: u64, shutdown_token: &CancellationToken) -> Result<()> {
        let header = self.inner.context().l2_header(block_id, shutdown_token).await?;
        self.heartbeater
            .sign_and_send_block(block_id, header.hash)
            .await
    }
}

#[async_trait]
impl ChainEventHandler for GuardianBlockProposedHandler {
    fn kind(&self) -> EventKind {
        EventKind::BlockProposed
    }

    async fn handle(&self, event: ChainEvent, shutdown_token: &CancellationToken) -> Result<()> {
        let ChainEvent::BlockProposed(event) = event else {
            return Err(Error::UnexpectedEvent(event.kind()));
        };

        match self.sign_block(event.block_id, shutdown_token).await {
            Ok(()) => {}
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => warn!(block_id = event.block_id, error = %e, "Failed to send signed block"),
        }

        self.inner.process(event, shutdown_token).await.map(|_| ())
    }
}
