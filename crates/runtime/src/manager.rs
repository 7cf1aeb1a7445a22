//! Contract manager: resolves addresses into observable deployment entries

use crate::connector::ConnectorSlot;
use crate::contract::{ContractSession, InitialConfig};
use crate::core::RuntimeConfig;
use crate::ledger::ContractAddress;
use crate::providers::{ProviderBundle, ProviderCache, ProviderFactory};
use crate::registry::{Deployment, DeploymentHandle, DeploymentRegistry, DeploymentState};
use crate::{Result, RuntimeError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Owns the provider cache and the deployment registry of one application
pub struct ContractManager {
    config: RuntimeConfig,
    initial: InitialConfig,
    registry: DeploymentRegistry,
    providers: Arc<ProviderCache>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl ContractManager {
    /// Validate configuration and set up an empty manager
    pub fn open(
        config: RuntimeConfig,
        slot: Arc<dyn ConnectorSlot>,
        factory: Arc<dyn ProviderFactory>,
    ) -> Result<Self> {
        config.validate()?;

        let providers = Arc::new(ProviderCache::new(slot, factory, config.discovery.clone()));
        info!(
            private_state_id = %config.providers.private_state_id,
            compatible_versions = %config.discovery.compatible_versions,
            "Contract manager opened"
        );

        Ok(Self {
            config,
            initial: InitialConfig::default(),
            registry: DeploymentRegistry::new(),
            providers,
            tasks: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Constructor arguments used by fresh deployments
    #[must_use]
    pub fn with_initial_config(mut self, initial: InitialConfig) -> Self {
        self.initial = initial;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Join the contract at `address`, or deploy a new one when `address` is `None`.
    ///
    /// An entry that already reached `Deployed` for `address` is returned as is.
    /// Any other call appends a new in-progress entry and resolves it in the
    /// background. Must be called from within a tokio runtime.
    pub fn resolve(&self, address: Option<ContractAddress>) -> DeploymentHandle {
        // `closed` only flips while `tasks` is locked
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if self.closed.load(Ordering::SeqCst) {
            warn!(address = ?address, "Resolve called on closed contract manager");
            return Arc::new(Deployment::with_state(
                address,
                DeploymentState::Failed(RuntimeError::Closed),
            ));
        }

        if let Some(existing) = address
            .as_ref()
            .and_then(|address| self.registry.find_deployed(address))
        {
            debug!(id = %existing.id(), "Reusing deployed contract");
            return existing;
        }

        let entry = Arc::new(Deployment::new(address));
        self.registry.push(entry.clone());
        info!(
            id = %entry.id(),
            address = ?entry.requested_address(),
            "Resolving contract"
        );

        let handle = tokio::spawn(run_resolution(
            self.providers.clone(),
            self.config.providers.private_state_id.clone(),
            self.initial.clone(),
            entry.clone(),
        ));

        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);

        entry
    }

    /// Every entry tracked so far, updated on each append
    pub fn deployments(&self) -> watch::Receiver<Vec<DeploymentHandle>> {
        self.registry.subscribe()
    }

    pub fn registry(&self) -> &DeploymentRegistry {
        &self.registry
    }

    /// Shared provider bundle, built on first use
    pub async fn providers(&self) -> Result<Arc<ProviderBundle>> {
        self.providers.get().await
    }

    /// Forget the provider bundle; the next resolution rediscovers the connector
    pub async fn invalidate_providers(&self) {
        self.providers.invalidate().await;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop accepting resolutions and abort the ones still running.
    /// Entries that had not settled are failed with [`RuntimeError::Closed`].
    pub async fn close(&self) {
        let tasks = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            if self.closed.swap(true, Ordering::SeqCst) {
                return;
            }
            std::mem::take(&mut *tasks)
        };
        info!(tasks = tasks.len(), "Closing contract manager");

        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            let _ = task.await;
        }

        let mut aborted = 0usize;
        for entry in self.registry.snapshot() {
            if entry.settle(DeploymentState::Failed(RuntimeError::Closed)) {
                aborted += 1;
            }
        }

        self.providers.invalidate().await;
        info!(aborted, tracked = self.registry.len(), "Contract manager closed");
    }
}

async fn run_resolution(
    providers: Arc<ProviderCache>,
    private_state_id: String,
    initial: InitialConfig,
    entry: DeploymentHandle,
) {
    let outcome = async {
        let bundle = providers.get().await?;
        match entry.requested_address() {
            Some(address) => ContractSession::join(bundle, &private_state_id, address.clone()).await,
            None => ContractSession::deploy(bundle, &private_state_id, initial).await,
        }
    }
    .await;

    let next = match outcome {
        Ok(session) => {
            info!(id = %entry.id(), address = %session.address(), "Contract resolved");
            DeploymentState::Deployed(Arc::new(session))
        }
        Err(e) => {
            error!(id = %entry.id(), error = %e, "Contract resolution failed");
            DeploymentState::Failed(e)
        }
    };

    entry.settle(next);
}
