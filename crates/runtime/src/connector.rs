//! Wallet connector discovery
//!
//! The connector slot is polled until a connector shows up. Its API version is
//! checked once against the configured requirement, then the connector is asked
//! for authorization. Finding the connector and authorizing it are bounded by two
//! separate windows so that "not installed" and "installed but silent" stay
//! distinguishable.

use crate::core::DiscoveryConfig;
use crate::ledger::{Bytes32, CoinInfo};
use crate::transaction::{BalancedTransaction, TransactionId, UnbalancedTransaction};
use crate::{Result, RuntimeError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info};

#[cfg(test)]
use mockall::automock;

/// Place a wallet connector is expected to appear in
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConnectorSlot: Send + Sync {
    /// Current occupant of the slot, if any
    async fn connector(&self) -> Option<Arc<dyn ConnectorApi>>;
}

/// Surface exposed by an injected wallet connector
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConnectorApi: Send + Sync {
    /// Version string of the connector API
    fn api_version(&self) -> String;

    /// Whether this application is already authorized
    async fn is_enabled(&self) -> Result<bool>;

    /// Request authorization, yielding the signer session on approval
    async fn enable(&self) -> Result<Arc<dyn WalletSession>>;

    /// Network service endpoints the wallet is configured with
    async fn service_uri_config(&self) -> Result<ServiceUriConfig>;
}

/// Authorized signer session handed out by a connector
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WalletSession: Send + Sync {
    async fn state(&self) -> Result<WalletState>;

    /// Add fee inputs and the wallet's proofs for them
    async fn balance_and_prove(
        &self,
        tx: UnbalancedTransaction,
        new_coins: Vec<CoinInfo>,
    ) -> Result<BalancedTransaction>;

    async fn submit(&self, tx: BalancedTransaction) -> Result<TransactionId>;
}

/// Public keys of the connected wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletState {
    #[serde(with = "crate::ledger::hex_array")]
    pub coin_public_key: Bytes32,
    #[serde(with = "crate::ledger::hex_array")]
    pub encryption_public_key: Bytes32,
}

/// Endpoints of the network services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUriConfig {
    pub prover_server_uri: String,
    pub indexer_uri: String,
    pub indexer_ws_uri: String,
}

/// Result of a successful discovery
#[derive(Clone)]
pub struct ConnectorSession {
    pub api_version: String,
    pub endpoints: ServiceUriConfig,
    pub wallet: Arc<dyn WalletSession>,
}

impl std::fmt::Debug for ConnectorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorSession")
            .field("api_version", &self.api_version)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

/// Discover, validate and authorize the wallet connector
pub async fn discover_connector(
    slot: &dyn ConnectorSlot,
    config: &DiscoveryConfig,
) -> Result<ConnectorSession> {
    let required = config.version_requirement()?;

    let connector = if let Ok(found) =
        timeout(config.find_timeout(), find_connector(slot, &required, config)).await
    {
        found?
    } else {
        error!("Could not find wallet connector");
        return Err(RuntimeError::ConnectorNotFound);
    };

    let wallet = if let Ok(authorized) =
        timeout(config.enable_timeout(), authorize(connector.as_ref())).await
    {
        authorized?
    } else {
        error!("Wallet connector has failed to respond");
        return Err(RuntimeError::ConnectorUnresponsive);
    };

    let endpoints = connector.service_uri_config().await?;
    info!(
        indexer = %endpoints.indexer_uri,
        prover = %endpoints.prover_server_uri,
        "Connected to wallet connector and retrieved service configuration"
    );

    Ok(ConnectorSession {
        api_version: connector.api_version(),
        endpoints,
        wallet,
    })
}

async fn find_connector(
    slot: &dyn ConnectorSlot,
    required: &semver::VersionReq,
    config: &DiscoveryConfig,
) -> Result<Arc<dyn ConnectorApi>> {
    let mut ticker = interval(config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(connector) = slot.connector().await else {
            debug!("Check for wallet connector: none present");
            continue;
        };

        let actual = connector.api_version();
        if !is_compatible(required, &actual) {
            error!(expected = %required, actual = %actual, "Incompatible version of wallet connector");
            return Err(RuntimeError::IncompatibleConnector {
                required: required.to_string(),
                actual,
            });
        }

        info!(version = %actual, "Compatible wallet connector found. Connecting.");
        return Ok(connector);
    }
}

async fn authorize(connector: &dyn ConnectorApi) -> Result<Arc<dyn WalletSession>> {
    let enabled = connector.is_enabled().await.map_err(not_authorized)?;
    info!(enabled, "Wallet connector enabled status");

    connector.enable().await.map_err(not_authorized)
}

fn not_authorized(err: RuntimeError) -> RuntimeError {
    error!(error = %err, "Unable to enable connector");
    match err {
        RuntimeError::NotAuthorized(_) => err,
        other => RuntimeError::NotAuthorized(other.to_string()),
    }
}

// Unparseable version strings never satisfy the requirement
fn is_compatible(required: &semver::VersionReq, actual: &str) -> bool {
    semver::Version::parse(actual.trim()).is_ok_and(|version| required.matches(&version))
}
