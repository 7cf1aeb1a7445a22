//! Contract Session Manager Service
//!
//! Resolves one contract through the wallet bridge and follows its derived state

pub mod bridge;
pub mod config;

pub use bridge::WalletBridge;
pub use config::Config;

use anyhow::{Context, Result};
use contract_session_runtime::{ContractManager, DeploymentState, NetworkProviderFactory};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{info, warn};

pub struct SessionHost {
    config: Config,
    manager: ContractManager,
}

impl SessionHost {
    pub fn new(config: Config) -> Result<Self> {
        let slot = Arc::new(WalletBridge::new(&config.wallet_bridge_url)?);
        let factory = Arc::new(NetworkProviderFactory::new(config.runtime.providers.clone()));
        let manager = ContractManager::open(config.runtime.clone(), slot, factory)
            .context("Failed to open contract manager")?;

        Ok(Self { config, manager })
    }

    /// Resolve the configured contract and log every derived state until the stream ends
    pub async fn run(&self) -> Result<()> {
        let address = self.config.contract_address()?;
        let entry = self.manager.resolve(address);

        let session = match entry.settled().await {
            DeploymentState::Deployed(session) => session,
            DeploymentState::Failed(error) => {
                return Err(error).context("Contract resolution failed");
            }
            DeploymentState::InProgress => anyhow::bail!("Contract resolution did not settle"),
        };
        info!(address = %session.address(), "Contract ready");

        let mut states = session.state_stream().await?;
        while let Some(state) = states.next().await {
            let state = state.context("Derived state stream failed")?;
            info!(
                unit_price = state.unit_price,
                available_shares = state.available_shares,
                sells = state.sells.len(),
                claimables = state.claimables.len(),
                "Derived state: {}",
                serde_json::to_string(&state)?
            );
        }

        warn!(address = %session.address(), "Derived state stream ended");
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.manager.close().await;
    }
}
