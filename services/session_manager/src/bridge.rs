//! HTTP wallet bridge
//!
//! A local wallet process exposes its connector over HTTP. The bridge plays the
//! role of the connector slot: the connector is present while the bridge answers
//! `GET /connector`.

use async_trait::async_trait;
use contract_session_runtime::connector::{
    ConnectorApi, ConnectorSlot, ServiceUriConfig, WalletSession, WalletState,
};
use contract_session_runtime::ledger::CoinInfo;
use contract_session_runtime::transaction::{
    BalancedTransaction, TransactionId, UnbalancedTransaction,
};
use contract_session_runtime::{Result, RuntimeError};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ConnectorInfo {
    api_version: String,
}

#[derive(Debug, Deserialize)]
struct EnabledResponse {
    enabled: bool,
}

#[derive(Debug, Serialize)]
struct BalanceRequest<'a> {
    tx: &'a UnbalancedTransaction,
    new_coins: &'a [CoinInfo],
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    tx_id: TransactionId,
}

#[derive(Clone)]
struct BridgeClient {
    http: reqwest::Client,
    base: String,
}

impl BridgeClient {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

/// Connector slot backed by the wallet bridge
pub struct WalletBridge {
    client: BridgeClient,
}

impl WalletBridge {
    pub fn new(base: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .build()?;

        Ok(Self {
            client: BridgeClient {
                http,
                base: base.trim_end_matches('/').to_string(),
            },
        })
    }
}

#[async_trait]
impl ConnectorSlot for WalletBridge {
    async fn connector(&self) -> Option<Arc<dyn ConnectorApi>> {
        let response = match self.client.http.get(self.client.url("/connector")).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(status = %response.status(), "Wallet bridge has no connector");
                return None;
            }
            Err(e) => {
                debug!(error = %e, "Wallet bridge not reachable");
                return None;
            }
        };

        match response.json::<ConnectorInfo>().await {
            Ok(info) => Some(Arc::new(BridgeConnector {
                client: self.client.clone(),
                api_version: info.api_version,
            })),
            Err(e) => {
                warn!(error = %e, "Malformed connector description from wallet bridge");
                None
            }
        }
    }
}

struct BridgeConnector {
    client: BridgeClient,
    api_version: String,
}

#[async_trait]
impl ConnectorApi for BridgeConnector {
    fn api_version(&self) -> String {
        self.api_version.clone()
    }

    async fn is_enabled(&self) -> Result<bool> {
        let response: EnabledResponse = self
            .client
            .http
            .get(self.client.url("/connector/enabled"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.enabled)
    }

    async fn enable(&self) -> Result<Arc<dyn WalletSession>> {
        let response = self
            .client
            .http
            .post(self.client.url("/connector/enable"))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(Arc::new(BridgeWallet {
                client: self.client.clone(),
            })),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RuntimeError::NotAuthorized(
                "wallet declined the authorization request".to_string(),
            )),
            status => Err(RuntimeError::Network(format!(
                "wallet bridge answered enable with {status}"
            ))),
        }
    }

    async fn service_uri_config(&self) -> Result<ServiceUriConfig> {
        Ok(self
            .client
            .http
            .get(self.client.url("/connector/config"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }
}

struct BridgeWallet {
    client: BridgeClient,
}

#[async_trait]
impl WalletSession for BridgeWallet {
    async fn state(&self) -> Result<WalletState> {
        Ok(self
            .client
            .http
            .get(self.client.url("/wallet/state"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn balance_and_prove(
        &self,
        tx: UnbalancedTransaction,
        new_coins: Vec<CoinInfo>,
    ) -> Result<BalancedTransaction> {
        Ok(self
            .client
            .http
            .post(self.client.url("/wallet/balance"))
            .json(&BalanceRequest {
                tx: &tx,
                new_coins: &new_coins,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn submit(&self, tx: BalancedTransaction) -> Result<TransactionId> {
        let response: SubmitResponse = self
            .client
            .http
            .post(self.client.url("/wallet/submit"))
            .json(&tx)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.tx_id)
    }
}
