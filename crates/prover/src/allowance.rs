//! Bond token allowance bootstrap.

use alloy_primitives::{Address, U256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    error::Result,
    retry::{RetryPolicy, retry_rpc},
    rpc::ProverRpc,
    sender::{TxSender, send_and_confirm},
};

/// Makes sure `spender` may pull at least `amount` bond tokens from `owner`.
///
/// Nothing happens when no amount is configured or the existing allowance covers it.
/// Otherwise a single approval is sent and confirmed. Allowance reads are retried
/// under `retry`, the approval itself is not.
pub async fn set_approval_amount(
    rpc: &dyn ProverRpc,
    sender: &dyn TxSender,
    owner: Address,
    spender: Address,
    amount: Option<U256>,
    retry: &RetryPolicy,
    shutdown_token: &CancellationToken,
) -> Result<()> {
    let Some(amount) = amount.filter(|amount| !amount.is_zero()) else {
        debug!(%spender, "No allowance configured, skipping approval");
        return Ok(());
    };

    let existing = retry_rpc(retry, shutdown_token, "allowance", || {
        rpc.allowance(owner, spender)
    })
    .await?;
    info!(%owner, %spender, %existing, "Existing allowance");

    if existing >= amount {
        info!(%spender, %existing, %amount, "Allowance already sufficient");
        return Ok(());
    }

    let opts = sender.get_opts().await?;
    let tx = rpc.approve_tx(&opts, spender, amount);
    let receipt = send_and_confirm(sender, tx, shutdown_token).await?;
    info!(
        %spender,
        %amount,
        tx_hash = %receipt.tx_hash,
        block_number = receipt.block_number,
        "Approval confirmed"
    );

    let updated = retry_rpc(retry, shutdown_token, "allowance", || {
        rpc.allowance(owner, spender)
    })
    .await?;
    info!(%owner, %spender, allowance = %updated, "New allowance");

    Ok(())
}
