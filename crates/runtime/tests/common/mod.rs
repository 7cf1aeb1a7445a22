//! In-process fakes for the connector and the network services

#![allow(dead_code)]

use async_trait::async_trait;
use contract_session_runtime::connector::{
    ConnectorApi, ConnectorSession, ConnectorSlot, ServiceUriConfig, WalletSession, WalletState,
};
use contract_session_runtime::ledger::{CoinInfo, ContractAddress, ContractState, LedgerState};
use contract_session_runtime::providers::{
    ContractStateStream, MemoryPrivateStateProvider, PrivateStateProvider, ProofProvider,
    ProviderBundle, ProviderFactory, PublicDataProvider, TransactionProvider, ZkConfig,
    ZkConfigProvider,
};
use contract_session_runtime::transaction::{
    BalancedTransaction, FinalizedTxData, LedgerTransaction, TransactionId, TxStatus,
    UnbalancedTransaction, UnprovenTransaction,
};
use contract_session_runtime::{Result, RuntimeConfig, RuntimeError};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

pub const OWNER_KEY: [u8; 32] = [0x7c; 32];

pub fn test_config() -> RuntimeConfig {
    RuntimeConfig::default()
}

pub fn endpoints() -> ServiceUriConfig {
    ServiceUriConfig {
        prover_server_uri: "http://prover.test".to_string(),
        indexer_uri: "http://indexer.test".to_string(),
        indexer_ws_uri: "ws://indexer.test/ws".to_string(),
    }
}

// ================================
// Ledger
// ================================

type Subscriber = (ContractAddress, mpsc::UnboundedSender<Result<ContractState>>);

/// Ledger that applies transactions as soon as they are submitted
#[derive(Default)]
pub struct FakeNetwork {
    contracts: Mutex<HashMap<ContractAddress, ContractState>>,
    finalized: Mutex<HashMap<TransactionId, FinalizedTxData>>,
    subscribers: Mutex<Vec<Subscriber>>,
    height: AtomicU64,
    reject_all: AtomicBool,
    pub proofs: AtomicUsize,
    pub circuits: Mutex<Vec<String>>,
}

impl FakeNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every later transaction finish with `FailEntirely`
    pub fn reject_transactions(&self) {
        self.reject_all.store(true, Ordering::SeqCst);
    }

    pub fn ledger(&self, address: &ContractAddress) -> Option<LedgerState> {
        self.contracts
            .lock()
            .unwrap()
            .get(address)
            .map(|state| LedgerState::from_contract_state(state).unwrap())
    }

    /// Store `ledger` at `address` and notify subscribers
    pub fn publish(&self, address: &ContractAddress, ledger: &LedgerState) {
        let state = ContractState {
            address: address.clone(),
            data: ledger.to_state_data().unwrap(),
            block_height: self.height.fetch_add(1, Ordering::SeqCst) + 1,
        };
        self.contracts
            .lock()
            .unwrap()
            .insert(address.clone(), state.clone());

        self.subscribers
            .lock()
            .unwrap()
            .retain(|(subscribed, tx)| subscribed != address || tx.send(Ok(state.clone())).is_ok());
    }

    fn apply(&self, payload: &LedgerTransaction) -> TxStatus {
        if self.reject_all.load(Ordering::SeqCst) {
            return TxStatus::FailEntirely;
        }

        match payload {
            LedgerTransaction::Deploy {
                address,
                initial_state,
                ..
            } => {
                self.publish(address, initial_state);
                TxStatus::SucceedEntirely
            }
            LedgerTransaction::Call {
                address,
                circuit,
                args,
            } => {
                let Some(mut ledger) = self.ledger(address) else {
                    return TxStatus::FailEntirely;
                };
                if circuit == "mint_share" {
                    let amount = u128::from(args["amount"].as_u64().unwrap_or(0));
                    if amount > ledger.available_shares {
                        return TxStatus::FailEntirely;
                    }
                    ledger.available_shares -= amount;
                }
                self.publish(address, &ledger);
                TxStatus::SucceedEntirely
            }
        }
    }
}

#[async_trait]
impl PublicDataProvider for FakeNetwork {
    async fn query_contract_state(&self, address: &ContractAddress) -> Result<Option<ContractState>> {
        Ok(self.contracts.lock().unwrap().get(address).cloned())
    }

    async fn contract_state_stream(&self, address: &ContractAddress) -> Result<ContractStateStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(current) = self.contracts.lock().unwrap().get(address).cloned() {
            tx.send(Ok(current)).unwrap();
        }
        self.subscribers.lock().unwrap().push((address.clone(), tx));
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn watch_for_tx_data(&self, tx_id: &TransactionId) -> Result<FinalizedTxData> {
        self.finalized
            .lock()
            .unwrap()
            .get(tx_id)
            .cloned()
            .ok_or_else(|| RuntimeError::Network(format!("unknown transaction {tx_id}")))
    }
}

#[async_trait]
impl TransactionProvider for FakeNetwork {
    fn coin_public_key(&self) -> [u8; 32] {
        OWNER_KEY
    }

    fn encryption_public_key(&self) -> [u8; 32] {
        [0x11; 32]
    }

    async fn balance_tx(
        &self,
        tx: UnbalancedTransaction,
        new_coins: Vec<CoinInfo>,
    ) -> Result<BalancedTransaction> {
        Ok(BalancedTransaction {
            payload: tx.payload,
            proof: tx.proof,
            new_coins,
        })
    }

    async fn submit_tx(&self, tx: BalancedTransaction) -> Result<TransactionId> {
        let status = self.apply(&tx.payload);
        let tx_id = TransactionId(format!("tx-{}", self.finalized.lock().unwrap().len() + 1));
        let data = FinalizedTxData {
            tx_id: tx_id.clone(),
            block_height: self.height.load(Ordering::SeqCst),
            status,
        };
        self.finalized.lock().unwrap().insert(tx_id.clone(), data);
        Ok(tx_id)
    }
}

#[async_trait]
impl ProofProvider for FakeNetwork {
    async fn prove(
        &self,
        tx: UnprovenTransaction,
        _zk_config: Option<ZkConfig>,
    ) -> Result<UnbalancedTransaction> {
        self.proofs.fetch_add(1, Ordering::SeqCst);
        Ok(UnbalancedTransaction {
            payload: tx.payload,
            proof: vec![0xaa; 4],
        })
    }
}

#[async_trait]
impl ZkConfigProvider for FakeNetwork {
    async fn get(&self, circuit: &str) -> Result<ZkConfig> {
        self.circuits.lock().unwrap().push(circuit.to_string());
        Ok(ZkConfig {
            circuit_id: circuit.to_string(),
            prover_key: vec![1],
            verifier_key: vec![2],
            zkir: vec![3],
        })
    }
}

pub fn bundle(network: &Arc<FakeNetwork>, private_state: Arc<dyn PrivateStateProvider>) -> ProviderBundle {
    ProviderBundle {
        private_state,
        zk_config: network.clone(),
        proof: network.clone(),
        public_data: network.clone(),
        transactions: network.clone(),
    }
}

// ================================
// Connector
// ================================

pub struct FakeWallet;

#[async_trait]
impl WalletSession for FakeWallet {
    async fn state(&self) -> Result<WalletState> {
        Ok(WalletState {
            coin_public_key: OWNER_KEY,
            encryption_public_key: [0x11; 32],
        })
    }

    async fn balance_and_prove(
        &self,
        _tx: UnbalancedTransaction,
        _new_coins: Vec<CoinInfo>,
    ) -> Result<BalancedTransaction> {
        Err(RuntimeError::Network("fake wallet does not balance".to_string()))
    }

    async fn submit(&self, _tx: BalancedTransaction) -> Result<TransactionId> {
        Err(RuntimeError::Network("fake wallet does not submit".to_string()))
    }
}

pub struct FakeConnector {
    version: String,
    pub enables: AtomicUsize,
}

impl FakeConnector {
    pub fn new(version: &str) -> Arc<Self> {
        Arc::new(Self {
            version: version.to_string(),
            enables: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ConnectorApi for FakeConnector {
    fn api_version(&self) -> String {
        self.version.clone()
    }

    async fn is_enabled(&self) -> Result<bool> {
        Ok(true)
    }

    async fn enable(&self) -> Result<Arc<dyn WalletSession>> {
        self.enables.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeWallet))
    }

    async fn service_uri_config(&self) -> Result<ServiceUriConfig> {
        Ok(endpoints())
    }
}

/// Connector slot whose occupant can change during a test
#[derive(Default)]
pub struct FakeSlot {
    connector: Mutex<Option<Arc<FakeConnector>>>,
}

impl FakeSlot {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(connector: Arc<FakeConnector>) -> Arc<Self> {
        let slot = Self::empty();
        slot.install(connector);
        slot
    }

    pub fn install(&self, connector: Arc<FakeConnector>) {
        *self.connector.lock().unwrap() = Some(connector);
    }
}

#[async_trait]
impl ConnectorSlot for FakeSlot {
    async fn connector(&self) -> Option<Arc<dyn ConnectorApi>> {
        self.connector
            .lock()
            .unwrap()
            .clone()
            .map(|connector| connector as Arc<dyn ConnectorApi>)
    }
}

/// Hands out bundles backed by a shared fake network
pub struct FakeFactory {
    pub network: Arc<FakeNetwork>,
    pub private_state: Arc<dyn PrivateStateProvider>,
    pub builds: AtomicUsize,
    delay: Duration,
}

impl FakeFactory {
    pub fn new(network: Arc<FakeNetwork>) -> Arc<Self> {
        Self::with_delay(network, Duration::ZERO)
    }

    pub fn with_delay(network: Arc<FakeNetwork>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            network,
            private_state: Arc::new(MemoryPrivateStateProvider::new()),
            builds: AtomicUsize::new(0),
            delay,
        })
    }

    pub fn with_private_state(
        network: Arc<FakeNetwork>,
        private_state: Arc<dyn PrivateStateProvider>,
    ) -> Arc<Self> {
        Arc::new(Self {
            network,
            private_state,
            builds: AtomicUsize::new(0),
            delay: Duration::ZERO,
        })
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderFactory for FakeFactory {
    async fn build(&self, session: ConnectorSession) -> Result<ProviderBundle> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        assert_eq!(session.endpoints, endpoints());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(bundle(&self.network, self.private_state.clone()))
    }
}
