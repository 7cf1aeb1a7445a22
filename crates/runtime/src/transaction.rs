//! Transaction payloads as they move through prove, balance and submit

use crate::ledger::{hex_array, hex_bytes, Bytes32, CoinInfo, ContractAddress, LedgerState};
use crate::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identifier assigned to a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contract-level content of a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerTransaction {
    Deploy {
        address: ContractAddress,
        #[serde(with = "hex_array")]
        owner: Bytes32,
        #[serde(with = "hex_array")]
        domain_separator: Bytes32,
        #[serde(with = "hex_array")]
        nonce: Bytes32,
        initial_state: LedgerState,
    },
    Call {
        address: ContractAddress,
        circuit: String,
        args: serde_json::Value,
    },
}

impl LedgerTransaction {
    /// Build a deploy payload, deriving the new contract's address from its content
    pub fn deploy(owner: Bytes32, domain_separator: Bytes32, initial_state: LedgerState) -> Result<Self> {
        let nonce: Bytes32 = rand::random();
        let address = derive_contract_address(&owner, &domain_separator, &nonce, &initial_state)?;

        Ok(Self::Deploy {
            address,
            owner,
            domain_separator,
            nonce,
            initial_state,
        })
    }

    pub fn address(&self) -> &ContractAddress {
        match self {
            Self::Deploy { address, .. } | Self::Call { address, .. } => address,
        }
    }

    /// Circuit the payload exercises, if any
    pub fn circuit(&self) -> Option<&str> {
        match self {
            Self::Deploy { .. } => None,
            Self::Call { circuit, .. } => Some(circuit),
        }
    }
}

fn derive_contract_address(
    owner: &Bytes32,
    domain_separator: &Bytes32,
    nonce: &Bytes32,
    initial_state: &LedgerState,
) -> Result<ContractAddress> {
    let mut hasher = Sha256::new();
    hasher.update(owner);
    hasher.update(domain_separator);
    hasher.update(nonce);
    hasher.update(initial_state.to_state_data()?);
    Ok(ContractAddress::new(hex::encode(hasher.finalize())))
}

/// Transaction before proving
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnprovenTransaction {
    pub payload: LedgerTransaction,
}

/// Proven transaction that still lacks fee inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnbalancedTransaction {
    pub payload: LedgerTransaction,
    #[serde(with = "hex_bytes")]
    pub proof: Vec<u8>,
}

/// Transaction balanced by the wallet and ready for submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancedTransaction {
    pub payload: LedgerTransaction,
    #[serde(with = "hex_bytes")]
    pub proof: Vec<u8>,
    pub new_coins: Vec<CoinInfo>,
}

/// Outcome of a transaction once included on the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    SucceedEntirely,
    FailFallible,
    FailEntirely,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedTxData {
    pub tx_id: TransactionId,
    pub block_height: u64,
    pub status: TxStatus,
}

impl FinalizedTxData {
    pub fn succeeded(&self) -> bool {
        self.status == TxStatus::SucceedEntirely
    }
}
