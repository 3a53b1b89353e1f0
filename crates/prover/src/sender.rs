//! L1 transaction sending and confirmation tracking.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_rpc_types_eth::{TransactionInput, TransactionReceipt, TransactionRequest};
use async_trait::async_trait;
use tokio::sync::{Mutex, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    error::{Error, Result},
    rpc::JsonRpcClient,
};

/// Opaque id of a transaction handed to a [`TxSender`].
pub type TxId = String;

/// Outcome of a transaction, delivered once per [`TxId`].
pub type TxConfirmation = Result<TxReceipt>;

/// Signing and fee options for a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxOptions {
    /// Account the transaction is sent from.
    pub from: Address,
    /// Fee cap, left to the node when `None`.
    pub max_fee_per_gas: Option<U256>,
}

/// A transaction ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxCandidate {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    /// Gas limit, estimated by the node when `None`.
    pub gas_limit: Option<u64>,
    pub max_fee_per_gas: Option<U256>,
}

impl TxCandidate {
    /// Creates a zero-value call to `to` with the sender options applied.
    pub fn new(opts: &TxOptions, to: Address, data: Bytes) -> Self {
        Self {
            from: opts.from,
            to,
            data,
            value: U256::ZERO,
            gas_limit: None,
            max_fee_per_gas: opts.max_fee_per_gas,
        }
    }

    /// Sets the gas limit.
    pub fn with_gas_limit(mut self, gas_limit: Option<u64>) -> Self {
        self.gas_limit = gas_limit;
        self
    }
}

/// Receipt of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    /// `true` if the transaction succeeded.
    pub status: bool,
}

/// Sends transactions and reports their confirmation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TxSender: Send + Sync {
    /// Returns the options transactions are built with.
    async fn get_opts(&self) -> Result<TxOptions>;

    /// Sends a transaction and returns its id.
    async fn send_transaction(&self, tx: TxCandidate) -> Result<TxId>;

    /// Returns the channel yielding the confirmation of `id`.
    ///
    /// Each id can be claimed once; later calls fail with [`Error::UnknownTx`].
    async fn tx_to_confirm_channel(&self, id: &TxId) -> Result<oneshot::Receiver<TxConfirmation>>;
}

/// Sends `tx` and waits for its confirmation.
///
/// Shutdown while waiting yields [`Error::Cancelled`]. A confirmation channel closed
/// without a result yields [`Error::ConfirmationDropped`].
pub async fn send_and_confirm(
    sender: &dyn TxSender,
    tx: TxCandidate,
    shutdown_token: &CancellationToken,
) -> Result<TxReceipt> {
    let id = sender.send_transaction(tx).await?;
    let confirmation = sender.tx_to_confirm_channel(&id).await?;

    tokio::select! {
        biased;
        _ = shutdown_token.cancelled() => {
            warn!(tx_id = %id, "Shutdown while waiting for confirmation");
            Err(Error::Cancelled)
        }
        result = confirmation => match result {
            Ok(confirmation) => confirmation,
            Err(_) => Err(Error::ConfirmationDropped(id)),
        },
    }
}

impl From<TxCandidate> for TransactionRequest {
    fn from(tx: TxCandidate) -> Self {
        let mut request = TransactionRequest::default()
            .from(tx.from)
            .to(tx.to)
            .value(tx.value)
            .input(TransactionInput::both(tx.data));
        if let Some(gas_limit) = tx.gas_limit {
            request = request.gas_limit(gas_limit);
        }
        if let Some(max_fee_per_gas) = tx.max_fee_per_gas {
            request = request.max_fee_per_gas(max_fee_per_gas.saturating_to());
        }
        request
    }
}

impl From<TransactionReceipt> for TxReceipt {
    fn from(r: TransactionReceipt) -> Self {
        Self {
            tx_hash: r.transaction_hash,
            block_number: r.block_number.unwrap_or_default(),
            status: r.status(),
        }
    }
}

/// [`TxSender`] relying on the L1 node to sign with an unlocked account.
///
/// Every sent transaction gets a task polling for its receipt until it is mined, the
/// confirmation deadline passes, or shutdown is requested.
pub struct NodeTxSender {
    client: JsonRpcClient,
    from: Address,
    poll_interval: Duration,
    confirmation_timeout: Duration,
    shutdown_token: CancellationToken,
    pending: Arc<Mutex<HashMap<TxId, oneshot::Receiver<TxConfirmation>>>>,
}

impl fmt::Debug for NodeTxSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTxSender")
            .field("url", self.client.url())
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

impl NodeTxSender {
    /// Create a new sender.
    pub fn new(
        client: JsonRpcClient,
        from: Address,
        poll_interval: Duration,
        confirmation_timeout: Duration,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            client,
            from,
            poll_interval,
            confirmation_timeout,
            shutdown_token,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn wait_for_receipt(
        client: JsonRpcClient,
        tx_hash: B256,
        poll_interval: Duration,
        timeout: Duration,
        shutdown_token: CancellationToken,
    ) -> TxConfirmation {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match client
                .request::<_, TransactionReceipt>("eth_getTransactionReceipt", (tx_hash,))
                .await
            {
                Ok(Some(receipt)) => {
                    let receipt = TxReceipt::from(receipt);
                    if !receipt.status {
                        return Err(Error::TxReverted(tx_hash));
                    }
                    return Ok(receipt);
                }
                Ok(None) => debug!(%tx_hash, "Transaction not mined yet"),
                Err(e) if e.is_retryable() => {
                    warn!(%tx_hash, error = %e, "Failed to fetch receipt, retrying")
                }
                Err(e) => return Err(e),
            }

            tokio::select! {
                biased;
                _ = shutdown_token.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(Error::ConfirmationTimeout(tx_hash));
                }
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
    }
}

#[async_trait]
impl TxSender for NodeTxSender {
    async fn get_opts(&self) -> Result<TxOptions> {
        let gas_price: U256 = self.client.request_some("eth_gasPrice", ()).await?;
        Ok(TxOptions {
            from: self.from,
            // Leave headroom for two base fee increases.
            max_fee_per_gas: Some(gas_price.saturating_mul(U256::from(2))),
        })
    }

    async fn send_transaction(&self, tx: TxCandidate) -> Result<TxId> {
        let request = <TransactionRequest as From<TxCandidate>>::from(tx);
        let tx_hash: B256 = self
            .client
            .request_some("eth_sendTransaction", (request,))
            .await?;

        let id = uuid::Uuid::new_v4().to_string();
        info!(tx_id = %id, %tx_hash, "Transaction sent");

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), rx);

        let client = self.client.clone();
        let poll_interval = self.poll_interval;
        let timeout = self.confirmation_timeout;
        let shutdown_token = self.shutdown_token.clone();
        tokio::spawn(async move {
            let confirmation =
                Self::wait_for_receipt(client, tx_hash, poll_interval, timeout, shutdown_token)
                    .await;
            // The receiver may already be gone if the caller stopped waiting.
            let _ = tx.send(confirmation);
        });

        Ok(id)
    }

    async fn tx_to_confirm_channel(&self, id: &TxId) -> Result<oneshot::Receiver<TxConfirmation>> {
        self.pending
            .lock()
            .await
            .remove(id)
            .ok_or_else(|| Error::UnknownTx(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt() -> TxReceipt {
        TxReceipt {
            tx_hash: B256::repeat_byte(0x11),
            block_number: 5,
            status: true,
        }
    }

    fn mock_sender(rx: oneshot::Receiver<TxConfirmation>) -> MockTxSender {
        let mut sender = MockTxSender::new();
        sender
            .expect_send_transaction()
            .times(1)
            .returning(|_| Ok("tx-1".to_string()));
        sender
            .expect_tx_to_confirm_channel()
            .times(1)
            .return_once(move |_| Ok(rx));
        sender
    }

    fn candidate() -> TxCandidate {
        TxCandidate::new(&TxOptions::default(), Address::ZERO, Bytes::new())
    }

    #[tokio::test]
    async fn test_send_and_confirm_success() {
        let (tx, rx) = oneshot::channel();
        tx.send(Ok(receipt())).unwrap();
        let sender = mock_sender(rx);

        let result = send_and_confirm(&sender, candidate(), &CancellationToken::new()).await;
        assert_eq!(result.unwrap(), receipt());
    }

    #[tokio::test]
    async fn test_send_and_confirm_reports_confirmation_error() {
        let (tx, rx) = oneshot::channel();
        tx.send(Err(Error::TxReverted(B256::ZERO))).unwrap();
        let sender = mock_sender(rx);

        let result = send_and_confirm(&sender, candidate(), &CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::TxReverted(_))));
    }

    #[tokio::test]
    async fn test_cancelled_wait_is_not_success() {
        let (_tx, rx) = oneshot::channel();
        let sender = mock_sender(rx);
        let token = CancellationToken::new();
        token.cancel();

        let result = send_and_confirm(&sender, candidate(), &token).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_dropped_confirmation_is_reported() {
        let (tx, rx) = oneshot::channel();
        drop(tx);
        let sender = mock_sender(rx);

        let result = send_and_confirm(&sender, candidate(), &CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::ConfirmationDropped(id)) if id == "tx-1"));
    }

    #[tokio::test]
    async fn test_confirm_channel_claimed_once() {
        let sender = NodeTxSender::new(
            JsonRpcClient::new("http://127.0.0.1:1".parse().unwrap()),
            Address::ZERO,
            Duration::from_millis(10),
            Duration::from_secs(1),
            CancellationToken::new(),
        );
        let (_tx, rx) = oneshot::channel();
        sender.pending.lock().await.insert("a".to_string(), rx);

        assert!(sender.tx_to_confirm_channel(&"a".to_string()).await.is_ok());
        assert!(matches!(
            sender.tx_to_confirm_channel(&"a".to_string()).await,
            Err(Error::UnknownTx(_))
        ));
    }

    #[test]
    fn test_send_request_serialization() {
        let tx = candidate().with_gas_limit(Some(1_000_000));
        let value = serde_json::to_value(<TransactionRequest as From<TxCandidate>>::from(tx)).unwrap();
        assert_eq!(value["gas"], "0xf4240");
        assert!(value.get("maxFeePerGas").is_none());
        assert_eq!(value["input"], value["data"]);
    }
}
