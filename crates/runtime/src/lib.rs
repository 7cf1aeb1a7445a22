//! Contract Session Runtime
//!
//! Discovers a wallet connector, builds the providers needed to reach the
//! network, deploys or joins a single contract instance, and exposes a live
//! derived view of that contract's state.

pub mod combinator;
pub mod connector;
pub mod contract;
pub mod core;
pub mod decode;
pub mod derived;
pub mod ledger;
pub mod manager;
pub mod providers;
pub mod registry;
pub mod transaction;

pub use crate::core::{DiscoveryConfig, ProviderConfig, Result, RuntimeConfig, RuntimeError};
pub use combinator::{combine_latest, CombineLatest};
pub use connector::{
    discover_connector, ConnectorApi, ConnectorSession, ConnectorSlot, ServiceUriConfig,
    WalletSession, WalletState,
};
pub use contract::{CircuitCall, ContractSession, InitialConfig, DEFAULT_PRIVATE_STATE_ID};
pub use decode::{bytes_to_identifier, NIL_IDENTIFIER};
pub use derived::{DecodedCoinInfo, DerivedState, DerivedStateStream};
pub use ledger::{
    AssetPublicInfo, CoinInfo, ContractAddress, ContractPrivateState, ContractState, LedgerState,
    Offer, QualifiedCoinInfo,
};
pub use manager::ContractManager;
pub use providers::{NetworkProviderFactory, ProviderBundle, ProviderCache, ProviderFactory};
pub use registry::{Deployment, DeploymentHandle, DeploymentRegistry, DeploymentState};
pub use transaction::{FinalizedTxData, TransactionId, TxStatus};
