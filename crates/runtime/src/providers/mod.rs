//! Providers needed to talk to the network on behalf of a contract
//!
//! A [`ProviderBundle`] groups the five collaborators a contract session uses:
//! private state storage, circuit configuration, proving, ledger reads and
//! transaction balancing/submission. Bundles are built from a
//! [`ConnectorSession`] by a [`ProviderFactory`] and shared through the
//! single-flight [`ProviderCache`].

mod cache;
mod indexer;
mod private_state;
mod proof;
mod wallet;
mod zk_config;

pub use cache::ProviderCache;
pub use indexer::IndexerPublicDataProvider;
pub use private_state::{FilePrivateStateProvider, MemoryPrivateStateProvider};
pub use proof::HttpProofProvider;
pub use wallet::WalletTransactionProvider;
pub use zk_config::{HttpZkConfigProvider, ZkConfig};

use crate::connector::ConnectorSession;
use crate::core::ProviderConfig;
use crate::ledger::{Bytes32, CoinInfo, ContractAddress, ContractPrivateState, ContractState};
use crate::transaction::{
    BalancedTransaction, FinalizedTxData, TransactionId, UnbalancedTransaction, UnprovenTransaction,
};
use crate::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use tracing::info;

/// Stream of raw contract-state snapshots
pub type ContractStateStream = BoxStream<'static, Result<ContractState>>;

/// Persistent key-value store for private state
#[async_trait]
pub trait PrivateStateProvider: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<ContractPrivateState>>;

    async fn set(&self, id: &str, state: ContractPrivateState) -> Result<()>;

    /// Stored state for `id`, storing `candidate` first when there is none.
    /// Stores shared between tasks override this to make it atomic.
    async fn get_or_insert(
        &self,
        id: &str,
        candidate: ContractPrivateState,
    ) -> Result<ContractPrivateState> {
        if let Some(existing) = self.get(id).await? {
            return Ok(existing);
        }
        self.set(id, candidate.clone()).await?;
        Ok(candidate)
    }
}

/// Fetches proving material for a circuit
#[async_trait]
pub trait ZkConfigProvider: Send + Sync {
    async fn get(&self, circuit: &str) -> Result<ZkConfig>;
}

#[async_trait]
pub trait ProofProvider: Send + Sync {
    /// Prove a transaction; deploy transactions carry no circuit material
    async fn prove(
        &self,
        tx: UnprovenTransaction,
        zk_config: Option<ZkConfig>,
    ) -> Result<UnbalancedTransaction>;
}

/// Read access to the public ledger
#[async_trait]
pub trait PublicDataProvider: Send + Sync {
    /// Current state of a contract, `None` when nothing is deployed there
    async fn query_contract_state(&self, address: &ContractAddress) -> Result<Option<ContractState>>;

    /// Latest-first stream of a contract's state. The current state, if any,
    /// is emitted first.
    async fn contract_state_stream(&self, address: &ContractAddress) -> Result<ContractStateStream>;

    /// Wait until a submitted transaction is finalized
    async fn watch_for_tx_data(&self, tx_id: &TransactionId) -> Result<FinalizedTxData>;
}

/// Balancing and submission of transactions through the wallet
#[async_trait]
pub trait TransactionProvider: Send + Sync {
    fn coin_public_key(&self) -> Bytes32;

    fn encryption_public_key(&self) -> Bytes32;

    async fn balance_tx(
        &self,
        tx: UnbalancedTransaction,
        new_coins: Vec<CoinInfo>,
    ) -> Result<BalancedTransaction>;

    async fn submit_tx(&self, tx: BalancedTransaction) -> Result<TransactionId>;
}

/// Everything a contract session needs from the network
#[derive(Clone)]
pub struct ProviderBundle {
    pub private_state: Arc<dyn PrivateStateProvider>,
    pub zk_config: Arc<dyn ZkConfigProvider>,
    pub proof: Arc<dyn ProofProvider>,
    pub public_data: Arc<dyn PublicDataProvider>,
    pub transactions: Arc<dyn TransactionProvider>,
}

impl std::fmt::Debug for ProviderBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderBundle").finish_non_exhaustive()
    }
}

/// Turns an authorized connector session into a provider bundle
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    async fn build(&self, session: ConnectorSession) -> Result<ProviderBundle>;
}

/// Builds providers backed by the discovered network services
pub struct NetworkProviderFactory {
    config: ProviderConfig,
    http: reqwest::Client,
}

impl NetworkProviderFactory {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ProviderFactory for NetworkProviderFactory {
    async fn build(&self, session: ConnectorSession) -> Result<ProviderBundle> {
        let wallet_state = session.wallet.state().await?;
        let endpoints = &session.endpoints;

        info!(
            api_version = %session.api_version,
            store = %self.config.private_state_store,
            "Building network providers"
        );

        let private_state = FilePrivateStateProvider::new(
            &self.config.private_state_dir,
            &self.config.private_state_store,
        )?;
        let zk_config = HttpZkConfigProvider::new(self.http.clone(), &self.config.zk_config_base);
        let proof = HttpProofProvider::new(self.http.clone(), &endpoints.prover_server_uri);
        let public_data = IndexerPublicDataProvider::new(
            self.http.clone(),
            &endpoints.indexer_uri,
            &endpoints.indexer_ws_uri,
        )
        .with_tx_timeout(self.config.tx_timeout());
        let transactions = WalletTransactionProvider::new(session.wallet.clone(), wallet_state);

        Ok(ProviderBundle {
            private_state: Arc::new(private_state),
            zk_config: Arc::new(zk_config),
            proof: Arc::new(proof),
            public_data: Arc::new(public_data),
            transactions: Arc::new(transactions),
        })
    }
}
