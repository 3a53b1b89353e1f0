use std::time::Duration;

use async_trait::async_trait;
use rollup_prover_types::{
    BlockProposedEvent, ChainEvent, ContestRequest, EventKind, ProofRequest, ProofStatus, TierId,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    ChainEventHandler, HandlerConfig, HandlerContext, WorkSenders, assignment_expiry, send_work,
    unix_now,
};
use crate::{
    error::{Error, Result},
    registry::select_tier,
    retry::retry_rpc,
    tracker::{BlockState, WorkKey},
};

/// What the prover does about a proposed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing to do.
    Skip(&'static str),
    /// Generate and submit a proof of this tier.
    Prove(TierId),
    /// Contest the submitted transition of this tier.
    Contest(TierId),
    /// Someone else holds the assignment until this unix time.
    WaitForExpiry(u64),
}

/// Decides whether and how to act on a proposed block.
///
/// A submitted transition that disagrees with the local chain takes precedence over
/// the assignment: guardians override it, contesters contest it. Otherwise the
/// assigned prover proves immediately and everyone else waits for the assignment to
/// expire, if allowed to prove unassigned blocks at all.
pub fn decide(
    config: &HandlerConfig,
    tier_ids: &[TierId],
    event: &BlockProposedEvent,
    status: &ProofStatus,
    proving_window: Duration,
    now: u64,
) -> Decision {
    if status.is_submitted {
        if !status.invalid {
            return Decision::Skip("valid transition already submitted");
        }
        if config.guardian {
            return match select_tier(tier_ids, event.meta.min_tier, true) {
                Some(tier) => Decision::Prove(tier),
                None => Decision::Skip("no guardian tier"),
            };
        }
        if config.contester_mode {
            let tier = status
                .current_transition
                .as_ref()
                .map(|t| t.tier)
                .unwrap_or(event.meta.min_tier);
            return Decision::Contest(tier);
        }
        return Decision::Skip("invalid transition submitted, contester mode disabled");
    }

    let Some(tier) = select_tier(tier_ids, event.meta.min_tier, config.guardian) else {
        return Decision::Skip("no eligible tier");
    };

    if event.assigned_prover == config.prover_address {
        return Decision::Prove(tier);
    }

    let expiry = assignment_expiry(event.meta.timestamp, proving_window);
    let unassigned = event.assigned_prover.is_zero() || now >= expiry;
    match (unassigned, config.prove_unassigned_blocks) {
        (_, false) => Decision::Skip("assigned to another prover"),
        (true, true) => Decision::Prove(tier),
        (false, true) => Decision::WaitForExpiry(expiry),
    }
}

/// Handles `BlockProposed` events and advances the L1 cursor.
#[derive(Debug, Clone)]
pub struct BlockProposedHandler {
    ctx: HandlerContext,
    senders: WorkSenders,
}

impl BlockProposedHandler {
    pub fn new(ctx: HandlerContext, senders: WorkSenders) -> Self {
        Self { ctx, senders }
    }

    pub fn context(&self) -> &HandlerContext {
        &self.ctx
    }

    /// Handles one proposal and returns what was decided.
    pub async fn process(
        &self,
        event: BlockProposedEvent,
        shutdown_token: &CancellationToken,
    ) -> Result<Decision> {
        let block_id = event.block_id;

        let decision = if self.ctx.is_verified(block_id, shutdown_token).await? {
            Decision::Skip("block already verified")
        } else if self
            .ctx
            .tracker
            .is_known_proposal(block_id, event.origin.block_hash)
            .await
        {
            Decision::Skip("proposal already handled")
        } else {
            let status = self.ctx.proof_status(block_id, shutdown_token).await?;
            let proving_window = self
                .ctx
                .state
                .tier(event.meta.min_tier)
                .map(|t| t.proving_window)
                .unwrap_or_default();
            let decision = decide(
                &self.ctx.config,
                &self.ctx.tier_ids(),
                &event,
                &status,
                proving_window,
                unix_now(),
            );
            self.ctx
                .tracker
                .observe_proposal(block_id, event.origin.block_hash)
                .await;
            self.act(&event, &status, decision, shutdown_token).await?
        };

        if let Decision::Skip(reason) = &decision {
            debug!(block_id, reason, "Skipping proposed block");
        }

        self.advance_l1_current(&event, shutdown_token).await?;
        Ok(decision)
    }

    /// Carries out `decision` and returns what was actually done.
    async fn act(
        &self,
        event: &BlockProposedEvent,
        status: &ProofStatus,
        decision: Decision,
        shutdown_token: &CancellationToken,
    ) -> Result<Decision> {
        let block_id = event.block_id;
        match decision {
            Decision::Skip(_) => {}
            Decision::Prove(tier) => {
                info!(
                    block_id,
                    tier,
                    assigned_prover = %event.assigned_prover,
                    "Requesting proof"
                );
                self.ctx
                    .tracker
                    .set_state(block_id, BlockState::ProofRequested)
                    .await;
                let request = ProofRequest {
                    block_id,
                    tier,
                    meta: event.meta.clone(),
                };
                send_work(&self.senders.proof_generation, request, "proof generation").await?;
            }
            Decision::Contest(tier) => {
                warn!(block_id, tier, "Submitted transition disagrees with local chain");
                let key = WorkKey::Contest {
                    block_hash: status
                        .current_transition
                        .as_ref()
                        .map(|t| t.block_hash)
                        .unwrap_or_default(),
                };
                if !self
                    .ctx
                    .tracker
                    .claim(block_id, key, BlockState::ContestRequested)
                    .await
                {
                    return Ok(Decision::Skip("contest already requested"));
                }
                let request = ContestRequest {
                    block_id,
                    proposed_in: event.meta.l1_height,
                    parent_hash: status.parent_header.hash,
                    meta: event.meta.clone(),
                    tier,
                };
                send_work(&self.senders.proof_contest, request, "proof contest").await?;
            }
            Decision::WaitForExpiry(at) => {
                self.schedule_expiry(event.clone(), at, shutdown_token).await;
            }
        }
        Ok(decision)
    }

    /// Notifies the assignment-expired channel once the proving window lapsed.
    async fn schedule_expiry(
        &self,
        event: BlockProposedEvent,
        at: u64,
        shutdown_token: &CancellationToken,
    ) {
        let block_id = event.block_id;
        let timer = shutdown_token.child_token();
        self.ctx.tracker.set_expiry(block_id, timer.clone()).await;

        let delay = Duration::from_secs(at.saturating_sub(unix_now()));
        info!(block_id, expires_at = at, delay_secs = delay.as_secs(), "Waiting for assignment expiry");

        let tx = self.senders.assignment_expired.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;

                _ = timer.cancelled() => {
                    debug!(block_id, "Assignment expiry timer cancelled");
                }

                _ = tokio::time::sleep(delay) => {
                    if tx.send(event).await.is_err() {
                        warn!(block_id, "Assignment expired channel closed");
                    }
                }
            }
        });
    }

    async fn advance_l1_current(
        &self,
        event: &BlockProposedEvent,
        shutdown_token: &CancellationToken,
    ) -> Result<()> {
        let header = retry_rpc(&self.ctx.config.retry, shutdown_token, "l1 header", || {
            self.ctx.rpc.l1_header_by_hash(event.origin.block_hash)
        })
        .await?;
        let number = header.number;
        if !self.ctx.state.set_l1_current(header) {
            debug!(l1_number = number, "L1 cursor already ahead");
        }
        Ok(())
    }
}

#[async_trait]
impl ChainEventHandler for BlockProposedHandler {
    fn kind(&self) -> EventKind {
        EventKind::BlockProposed
    }

    async fn handle(&self, event: ChainEvent, shutdown_token: &CancellationToken) -> Result<()> {
        let ChainEvent::BlockProposed(event) = event else {
            return Err(Error::UnexpectedEvent(event.kind()));
        };
        self.process(event, shutdown_token).await.map(|_| ())
    }
}
