//! Configuration for the session manager service

use anyhow::{Context, Result};
use contract_session_runtime::{ContractAddress, RuntimeConfig};
use serde::Deserialize;
use std::{env, fs, path::PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the wallet bridge
    pub wallet_bridge_url: String,

    /// Contract to join; a new contract is deployed when unset
    #[serde(default)]
    pub contract_address: Option<String>,

    /// Runtime settings
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Load configuration from file or environment variables
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Load from .env file if it exists
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("Could not load .env file: {}", e);
        }

        let config = if let Some(path) = config_path {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {path}"))?;

            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {path}"))?
        } else {
            Self::from_env()?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let mut runtime = RuntimeConfig::default();

        if let Some(value) = optional_var("POLL_INTERVAL_MS") {
            runtime.discovery.poll_interval_ms = value.parse().context("Invalid POLL_INTERVAL_MS")?;
        }
        if let Some(value) = optional_var("FIND_TIMEOUT_MS") {
            runtime.discovery.find_timeout_ms = value.parse().context("Invalid FIND_TIMEOUT_MS")?;
        }
        if let Some(value) = optional_var("ENABLE_TIMEOUT_MS") {
            runtime.discovery.enable_timeout_ms =
                value.parse().context("Invalid ENABLE_TIMEOUT_MS")?;
        }
        if let Some(value) = optional_var("COMPATIBLE_VERSIONS") {
            runtime.discovery.compatible_versions = value;
        }
        if let Some(value) = optional_var("PRIVATE_STATE_DIR") {
            runtime.providers.private_state_dir = PathBuf::from(value);
        }
        if let Some(value) = optional_var("PRIVATE_STATE_STORE") {
            runtime.providers.private_state_store = value;
        }
        if let Some(value) = optional_var("ZK_CONFIG_BASE") {
            runtime.providers.zk_config_base = value;
        }
        if let Some(value) = optional_var("TX_TIMEOUT_MS") {
            runtime.providers.tx_timeout_ms = value.parse().context("Invalid TX_TIMEOUT_MS")?;
        }

        Ok(Config {
            wallet_bridge_url: env::var("WALLET_BRIDGE_URL")
                .context("WALLET_BRIDGE_URL environment variable is required")?,
            contract_address: optional_var("CONTRACT_ADDRESS"),
            runtime,
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if !self.wallet_bridge_url.starts_with("http") {
            anyhow::bail!("Wallet bridge URL must start with http or https");
        }

        self.contract_address()?;
        self.runtime
            .validate()
            .context("Invalid runtime configuration")?;

        Ok(())
    }

    /// Parsed contract address, if one is configured
    pub fn contract_address(&self) -> Result<Option<ContractAddress>> {
        self.contract_address
            .as_deref()
            .map(|address| address.parse::<ContractAddress>().context("Invalid contract address"))
            .transpose()
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
