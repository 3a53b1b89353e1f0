use rollup_prover_types::BlockProposedEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{error::Error, handler::AssignmentExpiredHandler};

/// Feeds lapsed assignments to the [`AssignmentExpiredHandler`].
#[derive(Debug)]
pub struct ExpiryService {
    handler: AssignmentExpiredHandler,
    assignment_expired_rx: mpsc::Receiver<BlockProposedEvent>,
}

impl ExpiryService {
    pub fn new(
        handler: AssignmentExpiredHandler,
        assignment_expired_rx: mpsc::Receiver<BlockProposedEvent>,
    ) -> Self {
        Self {
            handler,
            assignment_expired_rx,
        }
    }

    pub async fn run(mut self, shutdown_token: CancellationToken) {
        info!("ExpiryService started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_token.cancelled() => {
                    info!("ExpiryService received shutdown signal");
                    break;
                }

                Some(event) = self.assignment_expired_rx.recv() => {
                    let block_id = event.block_id;
                    match self.handler.handle(event, &shutdown_token).await {
                        Ok(()) => {}
                        Err(Error::Cancelled) => debug!(block_id, "Expiry handling cancelled"),
                        Err(e) => error!(block_id, error = %e, "Failed to handle expired assignment"),
                    }
                }

                else => break,
            }
        }

        info!("ExpiryService stopped");
    }
}
