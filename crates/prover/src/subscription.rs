//! Polling subscription to rollup events on L1.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use rollup_prover_types::{ChainEvent, EventKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    error::{Error, Result},
    handler::ChainEventHandler,
    rpc::ProverRpc,
};

/// Maximum number of L1 blocks scanned per poll.
pub const MAX_BLOCK_RANGE: u64 = 1_000;

/// Polls L1 logs and feeds them, in chain order, to the registered handlers.
///
/// Delivery is at-least-once: when a handler fails, the poll resumes from that
/// event's L1 block and re-delivers everything from there.
pub struct EventSubscription {
    rpc: Arc<dyn ProverRpc>,
    handlers: HashMap<EventKind, Arc<dyn ChainEventHandler>>,
    poll_interval: Duration,
    next_from: u64,
}

impl fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSubscription")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .field("poll_interval", &self.poll_interval)
            .field("next_from", &self.next_from)
            .finish_non_exhaustive()
    }
}

impl EventSubscription {
    /// Creates a subscription starting at L1 block `from`, inclusive.
    pub fn new(rpc: Arc<dyn ProverRpc>, from: u64, poll_interval: Duration) -> Self {
        Self {
            rpc,
            handlers: HashMap::new(),
            poll_interval,
            next_from: from,
        }
    }

    /// Registers `handler` for its event kind, replacing any previous one.
    pub fn with_handler(mut self, handler: Arc<dyn ChainEventHandler>) -> Self {
        self.handlers.insert(handler.kind(), handler);
        self
    }

    /// Next L1 block to scan.
    pub fn next_from(&self) -> u64 {
        self.next_from
    }

    pub async fn run(mut self, shutdown_token: CancellationToken) {
        let mut poll_interval = tokio::time::interval(self.poll_interval);
        poll_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            from = self.next_from,
            kinds = self.handlers.len(),
            "EventSubscription started"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown_token.cancelled() => {
                    info!("EventSubscription received shutdown signal");
                    break;
                }

                _ = poll_interval.tick() => {
                    match self.poll_once(&shutdown_token).await {
                        Ok(()) => {}
                        Err(Error::Cancelled) => break,
                        Err(e) => warn!(from = self.next_from, error = %e, "Event poll failed"),
                    }
                }
            }
        }

        info!("EventSubscription stopped");
    }

    /// Scans the next block range and dispatches its events.
    pub async fn poll_once(&mut self, shutdown_token: &CancellationToken) -> Result<()> {
        let head = self.rpc.l1_header_by_number(None).await?.number;
        if head < self.next_from {
            return Ok(());
        }
        let from = self.next_from;
        let to = head.min(from + MAX_BLOCK_RANGE - 1);

        let mut events = Vec::new();
        for kind in EventKind::ALL {
            if self.handlers.contains_key(&kind) {
                events.extend(self.rpc.events(kind, from, to).await?);
            }
        }
        events.sort_by_key(|e| (e.origin().block_number, e.origin().log_index));
        debug!(from, to, events = events.len(), "Polled L1 events");

        for event in events {
            let block_number = event.origin().block_number;
            if let Err(e) = self.dispatch(event, shutdown_token).await {
                self.next_from = block_number;
                if e.is_cancelled() {
                    return Err(e);
                }
                error!(l1_block = block_number, error = %e, "Failed to handle event, will retry");
                return Ok(());
            }
        }

        self.next_from = to + 1;
        Ok(())
    }

    async fn dispatch(&self, event: ChainEvent, shutdown_token: &CancellationToken) -> Result<()> {
        let Some(handler) = self.handlers.get(&event.kind()) else {
            return Ok(());
        };
        handler.handle(event, shutdown_token).await
    }
}
