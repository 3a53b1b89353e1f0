//! Submission of contest transactions.

use std::{fmt, sync::Arc};

use alloy_primitives::B256;
use rollup_prover_types::{ContestRequest, Transition};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    error::Result,
    rpc::ProverRpc,
    sender::{TxReceipt, TxSender, send_and_confirm},
    tracker::{BlockState, BlockTracker},
    tx_builder::TxBuilder,
};

/// Contests transitions that disagree with the local L2 chain.
#[derive(Clone)]
pub struct ProofContester {
    rpc: Arc<dyn ProverRpc>,
    sender: Arc<dyn TxSender>,
    builder: Arc<dyn TxBuilder>,
    tracker: Arc<BlockTracker>,
    graffiti: B256,
}

impl fmt::Debug for ProofContester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProofContester").finish_non_exhaustive()
    }
}

impl ProofContester {
    pub fn new(
        rpc: Arc<dyn ProverRpc>,
        sender: Arc<dyn TxSender>,
        builder: Arc<dyn TxBuilder>,
        tracker: Arc<BlockTracker>,
        graffiti: B256,
    ) -> Self {
        Self {
            rpc,
            sender,
            builder,
            tracker,
            graffiti,
        }
    }

    /// Contests the current transition of `request.block_id` with the local one.
    pub async fn contest(
        &self,
        request: ContestRequest,
        shutdown_token: &CancellationToken,
    ) -> Result<TxReceipt> {
        let header = self.rpc.l2_header_by_number(request.block_id).await?;
        let transition = Transition {
            parent_hash: request.parent_hash,
            block_hash: header.hash,
            state_root: header.state_root,
            graffiti: self.graffiti,
        };

        let opts = self.sender.get_opts().await?;
        let tx = self.builder.build_contest(&opts, &request, &transition)?;
        let receipt = send_and_confirm(self.sender.as_ref(), tx, shutdown_token).await?;

        self.tracker
            .set_state(request.block_id, BlockState::Contested)
            .await;
        info!(
            block_id = request.block_id,
            tier = request.tier,
            tx_hash = %receipt.tx_hash,
            "Transition contested"
        );
        Ok(receipt)
    }
}
