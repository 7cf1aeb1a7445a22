//! Ledger reads through the indexer's HTTP and WebSocket endpoints

use super::{ContractStateStream, PublicDataProvider};
use crate::ledger::{ContractAddress, ContractState};
use crate::transaction::{FinalizedTxData, TransactionId};
use crate::{Result, RuntimeError};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

const STREAM_BUFFER: usize = 16;

/// WebSocket subscription request
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsRequest<'a> {
    Subscribe { address: &'a ContractAddress },
}

/// WebSocket notification
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsNotification {
    ContractState { state: ContractState },
    Error { message: String },
    #[serde(other)]
    Unknown,
}

#[derive(Clone)]
pub struct IndexerPublicDataProvider {
    http: reqwest::Client,
    uri: String,
    ws_uri: String,
    poll_interval: Duration,
    tx_timeout: Duration,
}

impl IndexerPublicDataProvider {
    pub fn new(http: reqwest::Client, uri: &str, ws_uri: &str) -> Self {
        Self {
            http,
            uri: uri.trim_end_matches('/').to_string(),
            ws_uri: ws_uri.to_string(),
            poll_interval: Duration::from_secs(1),
            tx_timeout: Duration::from_secs(300),
        }
    }

    /// How often transaction status is polled while waiting for finalization
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// How long to wait for a submitted transaction before giving up
    #[must_use]
    pub fn with_tx_timeout(mut self, tx_timeout: Duration) -> Self {
        self.tx_timeout = tx_timeout;
        self
    }

    fn contract_state_url(&self, address: &ContractAddress) -> String {
        format!("{}/contracts/{}/state", self.uri, address)
    }

    fn transaction_url(&self, tx_id: &TransactionId) -> String {
        format!("{}/transactions/{}", self.uri, tx_id)
    }

    /// Forward live snapshots until the subscription ends or the receiver is dropped
    async fn subscription_loop(
        self,
        address: ContractAddress,
        mut last_height: Option<u64>,
        tx: mpsc::Sender<Result<ContractState>>,
    ) -> Result<()> {
        let (ws_stream, _) = connect_async(&self.ws_uri).await?;
        let (mut write, mut read) = ws_stream.split();

        let request = WsRequest::Subscribe { address: &address };
        write.send(Message::text(serde_json::to_string(&request)?)).await?;
        info!(%address, ws = %self.ws_uri, "Subscribed to contract state");

        loop {
            tokio::select! {
                () = tx.closed() => {
                    debug!(%address, "Contract state subscriber dropped");
                    break;
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<WsNotification>(&text)? {
                                WsNotification::ContractState { state } => {
                                    // Only ever move forward
                                    if last_height.is_some_and(|h| state.block_height < h) {
                                        continue;
                                    }
                                    last_height = Some(state.block_height);
                                    if tx.send(Ok(state)).await.is_err() {
                                        break;
                                    }
                                }
                                WsNotification::Error { message } => {
                                    return Err(RuntimeError::WebSocket(message));
                                }
                                WsNotification::Unknown => {
                                    warn!(%address, "Ignoring unknown indexer notification");
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!(%address, "Contract state subscription closed");
                            break;
                        }
                        Some(Err(e)) => return Err(e.into()),
                        _ => {}
                    }
                }
            }
        }

        Ok(())
    }

    /// Poll the indexer until the transaction shows up
    async fn poll_tx_data(&self, tx_id: &TransactionId) -> Result<FinalizedTxData> {
        let url = self.transaction_url(tx_id);
        let mut ticker = tokio::time::interval(self.poll_interval);

        loop {
            ticker.tick().await;

            let response = self.http.get(&url).send().await?;
            if response.status() == StatusCode::NOT_FOUND {
                debug!(%tx_id, "Transaction not finalized yet");
                continue;
            }

            let data: FinalizedTxData = response.error_for_status()?.json().await?;
            info!(%tx_id, block_height = data.block_height, status = ?data.status, "Transaction finalized");
            return Ok(data);
        }
    }
}

#[async_trait]
impl PublicDataProvider for IndexerPublicDataProvider {
    async fn query_contract_state(&self, address: &ContractAddress) -> Result<Option<ContractState>> {
        let response = self.http.get(self.contract_state_url(address)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Ok(Some(response.error_for_status()?.json().await?))
    }

    async fn contract_state_stream(&self, address: &ContractAddress) -> Result<ContractStateStream> {
        let current = self.query_contract_state(address).await?;
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        let last_height = current.as_ref().map(|state| state.block_height);
        if let Some(state) = current {
            // Fresh channel, capacity is available
            let _ = tx.try_send(Ok(state));
        }

        let provider = self.clone();
        let address = address.clone();
        tokio::spawn(async move {
            let errors = tx.clone();
            if let Err(e) = provider.subscription_loop(address.clone(), last_height, tx).await {
                error!(%address, error = %e, "Contract state subscription failed");
                let _ = errors.send(Err(e)).await;
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn watch_for_tx_data(&self, tx_id: &TransactionId) -> Result<FinalizedTxData> {
        if let Ok(finalized) = timeout(self.tx_timeout, self.poll_tx_data(tx_id)).await {
            finalized
        } else {
            error!(%tx_id, timeout = ?self.tx_timeout, "Transaction was not finalized in time");
            Err(RuntimeError::Timeout)
        }
    }
}
