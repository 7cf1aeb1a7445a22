//! Handle to one deployed share-market contract

use crate::derived::{derived_state_stream, DerivedStateStream};
use crate::ledger::{
    AssetPublicInfo, Bytes32, CoinInfo, ContractAddress, ContractPrivateState, LedgerState, Offer,
    NATIVE_TOKEN,
};
use crate::providers::ProviderBundle;
use crate::transaction::{FinalizedTxData, LedgerTransaction, UnprovenTransaction};
use crate::{Result, RuntimeError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, trace};

/// Key the contract's private state is stored under
pub const DEFAULT_PRIVATE_STATE_ID: &str = "contractPrivateState";

const DOMAIN_SEPARATOR: &str = "share-market";

/// Constructor arguments of a fresh deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialConfig {
    pub asset_info: AssetPublicInfo,
    pub expected_coin_type: Bytes32,
    pub unit_price: u128,
    pub available_shares: u128,
    pub domain_separator: Bytes32,
}

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            asset_info: AssetPublicInfo {
                kind: "plots".to_string(),
                description: "my plots".to_string(),
            },
            expected_coin_type: NATIVE_TOKEN,
            unit_price: 1_000,
            available_shares: 1_000,
            domain_separator: pad(DOMAIN_SEPARATOR),
        }
    }
}

impl InitialConfig {
    fn ledger_state(&self) -> LedgerState {
        LedgerState {
            asset_info: self.asset_info.clone(),
            expected_coin_type: self.expected_coin_type,
            unit_price: self.unit_price,
            available_shares: self.available_shares,
            sells: BTreeMap::new(),
            claimables: BTreeMap::new(),
        }
    }
}

/// Zero-pad (or truncate) a string into 32 bytes
pub fn pad(s: &str) -> Bytes32 {
    let mut out = [0u8; 32];
    let bytes = s.as_bytes();
    let len = bytes.len().min(out.len());
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

/// Circuits callable on a deployed contract
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "circuit", rename_all = "snake_case")]
pub enum CircuitCall {
    MintShare { amount: u64, coin: CoinInfo },
    CreateSellOffer { shares: u64, unit_price: u128 },
    BuyOffer { offer: Offer, coin: CoinInfo },
    ClaimProceeds { offer: Offer },
}

impl CircuitCall {
    pub fn circuit(&self) -> &'static str {
        match self {
            Self::MintShare { .. } => "mint_share",
            Self::CreateSellOffer { .. } => "create_sell_offer",
            Self::BuyOffer { .. } => "buy_offer",
            Self::ClaimProceeds { .. } => "claim_proceeds",
        }
    }

    /// Coins the call hands to the contract
    fn new_coins(&self) -> Vec<CoinInfo> {
        match self {
            Self::MintShare { coin, .. } | Self::BuyOffer { coin, .. } => vec![coin.clone()],
            Self::CreateSellOffer { .. } | Self::ClaimProceeds { .. } => Vec::new(),
        }
    }
}

/// A deployed or joined contract instance
#[derive(Debug)]
pub struct ContractSession {
    address: ContractAddress,
    providers: Arc<ProviderBundle>,
    private_state_id: String,
    deploy_tx: Option<FinalizedTxData>,
}

impl ContractSession {
    /// Deploy a new contract instance
    pub async fn deploy(
        providers: Arc<ProviderBundle>,
        private_state_id: &str,
        initial: InitialConfig,
    ) -> Result<Self> {
        info!("Deploying contract");
        ensure_private_state(&providers, private_state_id).await?;

        let owner = providers.transactions.coin_public_key();
        let payload =
            LedgerTransaction::deploy(owner, initial.domain_separator, initial.ledger_state())?;
        let address = payload.address().clone();

        let finalized = run_transaction(&providers, payload, Vec::new(), None)
            .await
            .map_err(|e| match e {
                RuntimeError::DeploymentRejected(_) => e,
                other => RuntimeError::DeploymentRejected(other.to_string()),
            })?;

        if !finalized.succeeded() {
            return Err(RuntimeError::DeploymentRejected(format!(
                "deploy transaction {} finished with status {:?}",
                finalized.tx_id, finalized.status
            )));
        }

        trace!(%address, tx_id = %finalized.tx_id, block_height = finalized.block_height, "Contract deployed");

        Ok(Self {
            address,
            providers,
            private_state_id: private_state_id.to_string(),
            deploy_tx: Some(finalized),
        })
    }

    /// Attach to a contract that already exists at `address`
    pub async fn join(
        providers: Arc<ProviderBundle>,
        private_state_id: &str,
        address: ContractAddress,
    ) -> Result<Self> {
        info!(%address, "Joining contract");

        let state = providers
            .public_data
            .query_contract_state(&address)
            .await?
            .ok_or_else(|| RuntimeError::ContractNotFound(address.clone()))?;
        LedgerState::from_contract_state(&state)?;

        ensure_private_state(&providers, private_state_id).await?;

        trace!(%address, block_height = state.block_height, "Contract joined");

        Ok(Self {
            address,
            providers,
            private_state_id: private_state_id.to_string(),
            deploy_tx: None,
        })
    }

    pub fn address(&self) -> &ContractAddress {
        &self.address
    }

    /// Finalized deploy transaction, for sessions created by [`ContractSession::deploy`]
    pub fn deploy_tx(&self) -> Option<&FinalizedTxData> {
        self.deploy_tx.as_ref()
    }

    pub fn providers(&self) -> &Arc<ProviderBundle> {
        &self.providers
    }

    /// Current ledger fields of the contract
    pub async fn ledger_state(&self) -> Result<LedgerState> {
        let state = self
            .providers
            .public_data
            .query_contract_state(&self.address)
            .await?
            .ok_or_else(|| RuntimeError::ContractNotFound(self.address.clone()))?;
        LedgerState::from_contract_state(&state)
    }

    /// Prove, balance and submit a circuit call, waiting for finalization
    pub async fn submit_call(&self, call: CircuitCall) -> Result<FinalizedTxData> {
        let circuit = call.circuit();
        let zk_config = self.providers.zk_config.get(circuit).await?;

        let payload = LedgerTransaction::Call {
            address: self.address.clone(),
            circuit: circuit.to_string(),
            args: serde_json::to_value(&call)?,
        };
        let finalized =
            run_transaction(&self.providers, payload, call.new_coins(), Some(zk_config)).await?;

        if !finalized.succeeded() {
            return Err(RuntimeError::TransactionRejected(format!(
                "{circuit} transaction {} finished with status {:?}",
                finalized.tx_id, finalized.status
            )));
        }

        trace!(
            circuit,
            tx_id = %finalized.tx_id,
            block_height = finalized.block_height,
            "Transaction added"
        );
        Ok(finalized)
    }

    /// Mint `amount` shares, paying with a fresh native coin at the current unit price
    pub async fn mint_share(&self, amount: u64) -> Result<FinalizedTxData> {
        let ledger = self.ledger_state().await?;
        let value = u128::from(amount)
            .checked_mul(ledger.unit_price)
            .ok_or_else(|| {
                RuntimeError::TransactionRejected(format!(
                    "payment for {amount} shares at unit price {} overflows",
                    ledger.unit_price
                ))
            })?;
        let coin = CoinInfo::native(value);
        info!(address = %self.address, amount, value = coin.value, "Minting shares");

        self.submit_call(CircuitCall::MintShare { amount, coin }).await
    }

    /// Live derived view of this contract
    pub async fn state_stream(&self) -> Result<DerivedStateStream> {
        derived_state_stream(&self.address, &self.providers, &self.private_state_id).await
    }
}

async fn run_transaction(
    providers: &ProviderBundle,
    payload: LedgerTransaction,
    new_coins: Vec<CoinInfo>,
    zk_config: Option<crate::providers::ZkConfig>,
) -> Result<FinalizedTxData> {
    let unbalanced = providers
        .proof
        .prove(UnprovenTransaction { payload }, zk_config)
        .await?;
    let balanced = providers.transactions.balance_tx(unbalanced, new_coins).await?;
    let tx_id = providers.transactions.submit_tx(balanced).await?;

    providers.public_data.watch_for_tx_data(&tx_id).await
}

// Existing private state wins over a freshly generated one
async fn ensure_private_state(providers: &ProviderBundle, id: &str) -> Result<ContractPrivateState> {
    let candidate = ContractPrivateState::random();
    let state = providers.private_state.get_or_insert(id, candidate.clone()).await?;
    if state == candidate {
        info!(id, "Created private state");
    }
    Ok(state)
}
