use std::{fmt, sync::Arc, time::Duration};

use rollup_prover_types::TierId;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    allowance::set_approval_amount,
    bootstrap::{L1Cursor, init_l1_current},
    config::Config,
    contester::ProofContester,
    error::Result,
    handler::{
        AssignmentExpiredHandler, BlockProposedHandler, BlockVerifiedHandler, ChainEventHandler,
        GuardianBlockProposedHandler, HandlerConfig, HandlerContext, TransitionContestedHandler,
        TransitionProvedHandler, WorkSenders, work_channels,
    },
    heartbeat::{GuardianHeartbeater, HealthCheckHeartbeater, run_heartbeat_loop},
    producer::SgxProducerConfig,
    registry::{ProducerSettings, TierRegistry},
    retry::retry_rpc,
    rpc::{HttpRpcClient, ProverRpc},
    sender::{NodeTxSender, TxSender},
    service::{ContestService, ExpiryService, SubmitterService},
    state::SharedState,
    submitter::ProofSubmitter,
    subscription::EventSubscription,
    tracker::BlockTracker,
    tx_builder::{ProveBlockTxBuilder, TxBuilder},
};

/// External systems the prover talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub rpc: Arc<dyn ProverRpc>,
    pub sender: Arc<dyn TxSender>,
    pub builder: Arc<dyn TxBuilder>,
    /// Present in guardian mode.
    pub heartbeater: Option<Arc<dyn GuardianHeartbeater>>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("guardian", &self.heartbeater.is_some())
            .finish_non_exhaustive()
    }
}

impl Collaborators {
    /// Connects to the nodes and contracts named in `config`.
    pub fn from_config(config: &Config, shutdown_token: &CancellationToken) -> Result<Self> {
        let rpc = HttpRpcClient::new(
            config.l1_http_endpoint.clone(),
            config.l2_http_endpoint.clone(),
            config.contracts.rollup,
            config.contracts.tier_provider(),
            config.contracts.bond_token,
        );
        let sender = NodeTxSender::new(
            rpc.l1().clone(),
            config.prover_address,
            config.poll_interval(),
            config.confirmation_timeout(),
            shutdown_token.clone(),
        );
        let builder = ProveBlockTxBuilder::new(
            config.contracts.rollup,
            config.contracts.guardian_prover,
            None,
        );
        let heartbeater = match &config.guardian {
            Some(guardian) => {
                let heartbeater = HealthCheckHeartbeater::new(
                    guardian.health_check_endpoint.clone(),
                    &guardian.private_key,
                )?;
                info!(address = %heartbeater.address(), "Guardian signer configured");
                Some(Arc::new(heartbeater) as Arc<dyn GuardianHeartbeater>)
            }
            None => None,
        };

        Ok(Self {
            rpc: Arc::new(rpc),
            sender: Arc::new(sender),
            builder: Arc::new(builder),
            heartbeater,
        })
    }
}

/// An initialized prover, ready to start its services.
pub struct Prover {
    config: Arc<Config>,
    collaborators: Collaborators,
    state: Arc<SharedState>,
    tracker: Arc<BlockTracker>,
    registry: TierRegistry,
    cursor: L1Cursor,
}

impl fmt::Debug for Prover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prover")
            .field("registry", &self.registry)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl Prover {
    /// Loads the tier catalog, builds one submitter per tier, resolves the L1 cursor
    /// and grants the configured bond allowances.
    ///
    /// Any failure here is fatal: nothing has been started yet.
    pub async fn init(
        config: Arc<Config>,
        collaborators: Collaborators,
        shutdown_token: &CancellationToken,
    ) -> Result<Self> {
        let retry = config.retry_policy();
        let Collaborators {
            rpc,
            sender,
            builder,
            ..
        } = &collaborators;

        let tiers = retry_rpc(&retry, shutdown_token, "tiers", || rpc.tiers()).await?;
        let state = Arc::new(SharedState::new(tiers));
        info!(
            tiers = ?state.tiers().iter().map(|t| t.id).collect::<Vec<TierId>>(),
            "Protocol tiers loaded"
        );

        let tracker = Arc::new(BlockTracker::new());
        let settings = ProducerSettings {
            sgx: SgxProducerConfig {
                l1_endpoint: config.l1_http_endpoint.clone(),
                l1_beacon_endpoint: config.l1_beacon_endpoint.clone(),
                l2_endpoint: config.l2_http_endpoint.clone(),
            },
            raiko_host_endpoint: config.sgx.raiko_host_endpoint.clone(),
            dummy: config.sgx.dummy,
            enable_liveness_bond_proof: config.enable_liveness_bond_proof,
            retry,
        };
        let registry = TierRegistry::new(state.tiers(), &settings, |producer| {
            ProofSubmitter::new(
                rpc.clone(),
                producer,
                sender.clone(),
                builder.clone(),
                tracker.clone(),
                config.prover_address,
                config.graffiti_bytes(),
            )
        })?;

        let cursor =
            init_l1_current(rpc.as_ref(), &state, config.starting_block_id, shutdown_token)
                .await?;

        let spenders = std::iter::once(config.contracts.rollup)
            .chain(config.contracts.guardian_prover);
        for spender in spenders {
            set_approval_amount(
                rpc.as_ref(),
                sender.as_ref(),
                config.prover_address,
                spender,
                config.allowance,
                &retry,
                shutdown_token,
            )
            .await?;
        }

        Ok(Self {
            config,
            collaborators,
            state,
            tracker,
            registry,
            cursor,
        })
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }

    pub fn tracker(&self) -> &Arc<BlockTracker> {
        &self.tracker
    }

    pub fn cursor(&self) -> &L1Cursor {
        &self.cursor
    }

    fn handler_context(&self) -> HandlerContext {
        HandlerContext {
            rpc: self.collaborators.rpc.clone(),
            state: self.state.clone(),
            tracker: self.tracker.clone(),
            config: HandlerConfig {
                prover_address: self.config.prover_address,
                contester_mode: self.config.contester_mode,
                prove_unassigned_blocks: self.config.prove_unassigned_blocks,
                guardian: self.config.is_guardian(),
                retry: self.config.retry_policy(),
            },
        }
    }

    /// Builds the event subscription with a handler for every event kind.
    pub fn subscription(&self, senders: &WorkSenders) -> EventSubscription {
        let ctx = self.handler_context();

        let proposed = BlockProposedHandler::new(ctx.clone(), senders.clone());
        let proposed: Arc<dyn ChainEventHandler> = match &self.collaborators.heartbeater {
            Some(heartbeater) => Arc::new(GuardianBlockProposedHandler::new(
                proposed,
                heartbeater.clone(),
            )),
            None => Arc::new(proposed),
        };

        EventSubscription::new(
            self.collaborators.rpc.clone(),
            self.cursor.header.number,
            self.config.poll_interval(),
        )
        .with_handler(proposed)
        .with_handler(Arc::new(TransitionProvedHandler::new(
            ctx.clone(),
            senders.clone(),
        )))
        .with_handler(Arc::new(TransitionContestedHandler::new(
            ctx.clone(),
            senders.clone(),
        )))
        .with_handler(Arc::new(BlockVerifiedHandler::new(ctx)))
    }

    /// Starts every service, returning their handles.
    pub fn spawn(&self, shutdown_token: &CancellationToken) -> Vec<JoinHandle<()>> {
        let (senders, receivers) = work_channels(self.config.channel_capacity);
        let mut handles = Vec::new();

        // Start event subscription.

        {
            let subscription = self.subscription(&senders);
            let shutdown_token = shutdown_token.clone();

            handles.push(tokio::spawn(async move {
                subscription.run(shutdown_token).await;
            }));
        }

        // Start proof submission service.

        {
            let submitter_service = SubmitterService::new(
                self.registry.clone(),
                self.config.submitter_concurrency,
                self.config.channel_capacity,
                receivers.proof_generation,
                receivers.proof_submission,
            );
            let shutdown_token = shutdown_token.clone();

            handles.push(tokio::spawn(async move {
                submitter_service.run(shutdown_token).await;
            }));
        }

        // Start contest service.

        {
            let contester = ProofContester::new(
                self.collaborators.rpc.clone(),
                self.collaborators.sender.clone(),
                self.collaborators.builder.clone(),
                self.tracker.clone(),
                self.config.graffiti_bytes(),
            );
            let contest_service = ContestService::new(contester, receivers.proof_contest);
            let shutdown_token = shutdown_token.clone();

            handles.push(tokio::spawn(async move {
                contest_service.run(shutdown_token).await;
            }));
        }

        // Start assignment expiry service.

        {
            let handler = AssignmentExpiredHandler::new(self.handler_context(), senders);
            let expiry_service = ExpiryService::new(handler, receivers.assignment_expired);
            let shutdown_token = shutdown_token.clone();

            handles.push(tokio::spawn(async move {
                expiry_service.run(shutdown_token).await;
            }));
        }

        // Start guardian heartbeat.

        if let (Some(heartbeater), Some(guardian)) =
            (self.collaborators.heartbeater.clone(), &self.config.guardian)
        {
            let interval = Duration::from_millis(guardian.heartbeat_interval_ms);
            let shutdown_token = shutdown_token.clone();

            handles.push(tokio::spawn(async move {
                run_heartbeat_loop(heartbeater.as_ref(), interval, shutdown_token).await;
            }));
        }

        handles
    }
}
