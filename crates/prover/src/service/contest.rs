use rollup_prover_types::ContestRequest;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{contester::ProofContester, error::Error};

/// Submits contests one at a time, in the order they were requested.
#[derive(Debug)]
pub struct ContestService {
    contester: ProofContester,
    proof_contest_rx: mpsc::Receiver<ContestRequest>,
}

impl ContestService {
    pub fn new(contester: ProofContester, proof_contest_rx: mpsc::Receiver<ContestRequest>) -> Self {
        Self {
            contester,
            proof_contest_rx,
        }
    }

    pub async fn run(mut self, shutdown_token: CancellationToken) {
        info!("ContestService started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_token.cancelled() => {
                    info!("ContestService received shutdown signal");
                    break;
                }

                Some(request) = self.proof_contest_rx.recv() => {
                    let block_id = request.block_id;
                    match self.contester.contest(request, &shutdown_token).await {
                        Ok(_) => {}
                        Err(Error::Cancelled) => debug!(block_id, "Contest cancelled"),
                        Err(e) => error!(block_id, error = %e, "Contest failed"),
                    }
                }

                else => break,
            }
        }

        info!("ContestService stopped");
    }
}
