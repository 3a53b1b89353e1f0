use std::{collections::HashMap, sync::Arc};

use rollup_prover_types::{ProofRequest, TierId};
use tokio::{
    sync::{Semaphore, mpsc},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{error::Error, registry::TierRegistry, submitter::ProofSubmitter};

/// Routes proof requests to the submitter of their tier.
///
/// Each tier has its own worker, running at most `concurrency` submissions at a time.
/// Requests of one tier start in the order they were received.
#[derive(Debug)]
pub struct SubmitterService {
    registry: TierRegistry,
    concurrency: usize,
    capacity: usize,
    proof_generation_rx: mpsc::Receiver<ProofRequest>,
    proof_submission_rx: mpsc::Receiver<ProofRequest>,
}

impl SubmitterService {
    pub fn new(
        registry: TierRegistry,
        concurrency: usize,
        capacity: usize,
        proof_generation_rx: mpsc::Receiver<ProofRequest>,
        proof_submission_rx: mpsc::Receiver<ProofRequest>,
    ) -> Self {
        Self {
            registry,
            concurrency,
            capacity,
            proof_generation_rx,
            proof_submission_rx,
        }
    }

    pub async fn run(mut self, shutdown_token: CancellationToken) {
        let mut workers = JoinSet::new();
        let mut routes = HashMap::new();
        for submitter in self.registry.submitters() {
            let (tx, rx) = mpsc::channel(self.capacity);
            routes.insert(submitter.tier(), tx);
            let worker = TierWorker {
                submitter: submitter.clone(),
                semaphore: Arc::new(Semaphore::new(self.concurrency)),
                rx,
            };
            workers.spawn(worker.run(shutdown_token.clone()));
        }

        info!(
            tiers = ?self.registry.tier_ids(),
            concurrency = self.concurrency,
            "SubmitterService started"
        );

        loop {
            let request = tokio::select! {
                biased;

                _ = shutdown_token.cancelled() => {
                    info!("SubmitterService received shutdown signal");
                    break;
                }

                Some(request) = self.proof_generation_rx.recv() => request,

                Some(request) = self.proof_submission_rx.recv() => request,

                else => break,
            };

            route(&routes, request).await;
        }

        drop(routes);
        while workers.join_next().await.is_some() {}

        info!("SubmitterService stopped");
    }
}

async fn route(routes: &HashMap<TierId, mpsc::Sender<ProofRequest>>, request: ProofRequest) {
    let (block_id, tier) = (request.block_id, request.tier);
    let Some(tx) = routes.get(&tier) else {
        error!(block_id, tier, "No submitter for tier, dropping request");
        return;
    };
    if tx.send(request).await.is_err() {
        warn!(block_id, tier, "Submitter worker stopped, dropping request");
    }
}

struct TierWorker {
    submitter: ProofSubmitter,
    semaphore: Arc<Semaphore>,
    rx: mpsc::Receiver<ProofRequest>,
}

impl TierWorker {
    async fn run(mut self, shutdown_token: CancellationToken) {
        let tier = self.submitter.tier();
        let mut tasks = JoinSet::new();

        loop {
            let request = tokio::select! {
                biased;

                _ = shutdown_token.cancelled() => break,

                request = self.rx.recv() => match request {
                    Some(request) => request,
                    None => break,
                },

                Some(_) = tasks.join_next(), if !tasks.is_empty() => continue,
            };

            let permit = tokio::select! {
                biased;

                _ = shutdown_token.cancelled() => break,

                permit = self.semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let submitter = self.submitter.clone();
            let shutdown_token = shutdown_token.clone();
            tasks.spawn(async move {
                let _permit = permit;
                submit(&submitter, request, &shutdown_token).await;
            });
        }

        debug!(tier, in_flight = tasks.len(), "Draining tier worker");
        while tasks.join_next().await.is_some() {}
    }
}

async fn submit(
    submitter: &ProofSubmitter,
    request: ProofRequest,
    shutdown_token: &CancellationToken,
) {
    let (block_id, tier) = (request.block_id, request.tier);
    match submitter.submit(request, shutdown_token).await {
        Ok(_) => {}
        Err(Error::Cancelled) => debug!(block_id, tier, "Proof submission cancelled"),
        Err(e) => error!(block_id, tier, error = %e, "Proof submission failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use alloy_primitives::{Address, B256, Bytes};
    use async_trait::async_trait;
    use rollup_prover_types::{BlockMetadata, TierId};
    use tokio::sync::oneshot;

    use super::*;
    use crate::{
        error::ProducerError,
        producer::{ProofContext, ProofProducer},
        sender::{MockTxSender, TxCandidate, TxOptions, TxReceipt},
        test_utils::{FakeRpc, ME},
        tracker::BlockTracker,
        tx_builder::MockTxBuilder,
    };

    /// Producer tracking how many proofs are generated at once.
    #[derive(Debug, Default)]
    struct SlowProducer {
        tier: TierId,
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    #[async_trait]
    impl ProofProducer for SlowProducer {
        fn tier(&self) -> TierId {
            self.tier
        }

        async fn produce(
            &self,
            _ctx: &ProofContext,
            _shutdown_token: &CancellationToken,
        ) -> Result<Bytes, ProducerError> {
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(Bytes::from_static(&[1]))
        }
    }

    fn sender() -> MockTxSender {
        let mut sender = MockTxSender::new();
        sender
            .expect_get_opts()
            .returning(|| Ok(TxOptions::default()));
        sender
            .expect_send_transaction()
            .returning(|_| Ok("tx".to_string()));
        sender.expect_tx_to_confirm_channel().returning(|_| {
            let (tx, rx) = oneshot::channel();
            let _ = tx.send(Ok(TxReceipt {
                tx_hash: B256::repeat_byte(1),
                block_number: 1,
                status: true,
            }));
            Ok(rx)
        });
        sender
    }

    fn builder() -> MockTxBuilder {
        let mut builder = MockTxBuilder::new();
        builder
            .expect_build_prove()
            .returning(|opts, _, _| Ok(TxCandidate::new(opts, Address::ZERO, Bytes::new())));
        builder
    }

    fn request(block_id: u64, tier: TierId) -> ProofRequest {
        ProofRequest {
            block_id,
            tier,
            meta: BlockMetadata {
                id: block_id,
                ..Default::default()
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_run_with_bounded_concurrency() {
        let producer = Arc::new(SlowProducer {
            tier: 100,
            ..Default::default()
        });
        let tracker = Arc::new(BlockTracker::new());
        let rpc = Arc::new(FakeRpc::new().with_l2_chain(10));
        let submitter = ProofSubmitter::new(
            rpc,
            producer.clone(),
            Arc::new(sender()),
            Arc::new(builder()),
            tracker.clone(),
            ME,
            B256::ZERO,
        );
        let registry = TierRegistry::from_submitters(vec![submitter]);

        let (generation_tx, generation_rx) = mpsc::channel(16);
        let (submission_tx, submission_rx) = mpsc::channel(16);
        let service = SubmitterService::new(registry, 2, 16, generation_rx, submission_rx);
        let shutdown_token = CancellationToken::new();
        let handle = tokio::spawn(service.run(shutdown_token.clone()));

        for block_id in 1..=4 {
            generation_tx.send(request(block_id, 100)).await.unwrap();
        }
        submission_tx.send(request(5, 100)).await.unwrap();
        // Unknown tiers are dropped.
        generation_tx.send(request(6, 300)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_token.cancel();
        handle.await.unwrap();

        assert_eq!(producer.max_running.load(Ordering::SeqCst), 2);
        for block_id in 1..=5 {
            assert_eq!(
                tracker.state(block_id).await,
                Some(crate::tracker::BlockState::Proved)
            );
        }
        assert_eq!(tracker.state(6).await, None);
    }
}
