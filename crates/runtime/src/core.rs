//! Core runtime types: configuration and error handling

use serde::Deserialize;
use std::{path::PathBuf, time::Duration};
use thiserror::Error;

use crate::ledger::ContractAddress;

// ================================
// Configuration Types
// ================================

/// Runtime configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfig {
    /// Wallet connector discovery settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Provider bundle settings
    #[serde(default)]
    pub providers: ProviderConfig,
}

impl RuntimeConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.discovery.validate()?;
        self.providers.validate()
    }
}

/// Connector discovery timing and compatibility
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// How often the connector slot is polled (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Window for the connector to appear (milliseconds)
    #[serde(default = "default_find_timeout_ms")]
    pub find_timeout_ms: u64,

    /// Window for the connector to answer the authorization round-trip (milliseconds)
    #[serde(default = "default_enable_timeout_ms")]
    pub enable_timeout_ms: u64,

    /// Semver requirement the connector's API version must satisfy
    #[serde(default = "default_compatible_versions")]
    pub compatible_versions: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            find_timeout_ms: default_find_timeout_ms(),
            enable_timeout_ms: default_enable_timeout_ms(),
            compatible_versions: default_compatible_versions(),
        }
    }
}

impl DiscoveryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn find_timeout(&self) -> Duration {
        Duration::from_millis(self.find_timeout_ms)
    }

    pub fn enable_timeout(&self) -> Duration {
        Duration::from_millis(self.enable_timeout_ms)
    }

    /// Parsed form of `compatible_versions`
    pub fn version_requirement(&self) -> Result<semver::VersionReq> {
        semver::VersionReq::parse(&self.compatible_versions).map_err(|e| {
            RuntimeError::InvalidConfiguration(format!(
                "compatible_versions '{}': {}",
                self.compatible_versions, e
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(RuntimeError::InvalidConfiguration(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        self.version_requirement().map(|_| ())
    }
}

/// Provider bundle construction settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Name of the persistent private state store
    #[serde(default = "default_private_state_store")]
    pub private_state_store: String,

    /// Directory holding the persistent private state stores
    #[serde(default = "default_private_state_dir")]
    pub private_state_dir: PathBuf,

    /// Key under which the contract's private state is stored
    #[serde(default = "default_private_state_id")]
    pub private_state_id: String,

    /// Static base URL serving circuit keys and zkir
    #[serde(default = "default_zk_config_base")]
    pub zk_config_base: String,

    /// Upper bound on waiting for a submitted transaction to finalize (milliseconds)
    #[serde(default = "default_tx_timeout_ms")]
    pub tx_timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            private_state_store: default_private_state_store(),
            private_state_dir: default_private_state_dir(),
            private_state_id: default_private_state_id(),
            zk_config_base: default_zk_config_base(),
            tx_timeout_ms: default_tx_timeout_ms(),
        }
    }
}

impl ProviderConfig {
    pub fn tx_timeout(&self) -> Duration {
        Duration::from_millis(self.tx_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tx_timeout_ms == 0 {
            return Err(RuntimeError::InvalidConfiguration(
                "tx_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.private_state_store.trim().is_empty() {
            return Err(RuntimeError::InvalidConfiguration(
                "private_state_store must not be empty".to_string(),
            ));
        }
        if self.private_state_id.trim().is_empty() {
            return Err(RuntimeError::InvalidConfiguration(
                "private_state_id must not be empty".to_string(),
            ));
        }
        if !self.zk_config_base.starts_with("http") {
            return Err(RuntimeError::InvalidConfiguration(format!(
                "zk_config_base must start with http or https, got '{}'",
                self.zk_config_base
            )));
        }
        Ok(())
    }
}

// Default values
fn default_poll_interval_ms() -> u64 { 100 }
fn default_find_timeout_ms() -> u64 { 1_000 }
fn default_enable_timeout_ms() -> u64 { 5_000 }
fn default_compatible_versions() -> String { "^1".to_string() }
fn default_private_state_store() -> String { "contract-private-state".to_string() }
fn default_private_state_dir() -> PathBuf { PathBuf::from(".private-state") }
fn default_private_state_id() -> String { "contractPrivateState".to_string() }
fn default_zk_config_base() -> String { "http://localhost:8080".to_string() }
fn default_tx_timeout_ms() -> u64 { 300_000 }

// ================================
// Error Types
// ================================

#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("Could not find wallet connector. Extension installed?")]
    ConnectorNotFound,

    #[error("Incompatible version of wallet connector found. Require '{required}', got '{actual}'")]
    IncompatibleConnector { required: String, actual: String },

    #[error("Wallet connector has failed to respond. Extension enabled?")]
    ConnectorUnresponsive,

    #[error("Application is not authorized: {0}")]
    NotAuthorized(String),

    #[error("Provider initialization failed: {0}")]
    ProviderInitialization(Box<RuntimeError>),

    #[error("Contract not found at address {0}")]
    ContractNotFound(ContractAddress),

    #[error("Deployment rejected: {0}")]
    DeploymentRejected(String),

    #[error("Transaction rejected: {0}")]
    TransactionRejected(String),

    #[error("Array too short for identifier conversion: {0} bytes")]
    ArrayTooShort(usize),

    #[error("Invalid identifier format: {0}")]
    InvalidIdentifierFormat(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Private state storage error: {0}")]
    Storage(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Session manager is closed")]
    Closed,

    #[error("Timeout occurred")]
    Timeout,
}

impl RuntimeError {
    /// The innermost error, looking through provider initialization wrapping
    pub fn root(&self) -> &RuntimeError {
        match self {
            Self::ProviderInitialization(inner) => inner.root(),
            other => other,
        }
    }

    /// Whether the error came from connector discovery
    pub fn is_discovery_error(&self) -> bool {
        matches!(
            self.root(),
            Self::ConnectorNotFound
                | Self::IncompatibleConnector { .. }
                | Self::ConnectorUnresponsive
                | Self::NotAuthorized(_)
        )
    }
}

impl From<serde_json::Error> for RuntimeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for RuntimeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RuntimeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(err.to_string())
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<hex::FromHexError> for RuntimeError {
    fn from(err: hex::FromHexError) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
