//! Ledger-visible contract values and the raw snapshots they are decoded from

use crate::{Result, RuntimeError};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Raw 32-byte value as stored on the ledger
pub type Bytes32 = [u8; 32];

/// Color of the native token
pub const NATIVE_TOKEN: Bytes32 = [0u8; 32];

/// Address of a deployed contract instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractAddress(String);

impl ContractAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContractAddress {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(RuntimeError::InvalidConfiguration(
                "contract address must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Raw contract-state snapshot as returned by the ledger reader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractState {
    pub address: ContractAddress,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    pub block_height: u64,
}

/// Public description of the tokenized asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPublicInfo {
    pub kind: String,
    pub description: String,
}

/// A sell listing, used as the key of offer-indexed collections
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Offer {
    #[serde(with = "hex_array")]
    pub seller: Bytes32,
    pub shares: u64,
    pub unit_price: u128,
}

/// A coin that is not yet on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinInfo {
    #[serde(with = "hex_array")]
    pub nonce: Bytes32,
    #[serde(with = "hex_array")]
    pub color: Bytes32,
    pub value: u128,
}

impl CoinInfo {
    /// Fresh native-token coin with a random nonce
    pub fn native(value: u128) -> Self {
        Self {
            nonce: rand::random(),
            color: NATIVE_TOKEN,
            value,
        }
    }
}

/// A coin held by the contract, qualified by its Merkle tree index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifiedCoinInfo {
    #[serde(with = "hex_array")]
    pub nonce: Bytes32,
    #[serde(with = "hex_array")]
    pub color: Bytes32,
    pub value: u128,
    pub mt_index: u64,
}

/// Decoded ledger fields of the share-market contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub asset_info: AssetPublicInfo,
    #[serde(with = "hex_array")]
    pub expected_coin_type: Bytes32,
    pub unit_price: u128,
    pub available_shares: u128,
    #[serde(with = "offer_pairs")]
    pub sells: BTreeMap<Offer, QualifiedCoinInfo>,
    #[serde(with = "offer_pairs")]
    pub claimables: BTreeMap<Offer, QualifiedCoinInfo>,
}

impl LedgerState {
    /// Decode the ledger fields out of a raw snapshot
    pub fn from_contract_state(state: &ContractState) -> Result<Self> {
        serde_json::from_slice(&state.data).map_err(|e| {
            RuntimeError::Serialization(format!(
                "contract state at {} (height {}): {}",
                state.address, state.block_height, e
            ))
        })
    }

    /// Encode as raw snapshot data
    pub fn to_state_data(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Off-chain state owned by the local user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractPrivateState {
    #[serde(with = "hex_array")]
    pub secret_key: Bytes32,
    #[serde(with = "hex_array")]
    pub salt: Bytes32,
}

impl ContractPrivateState {
    pub fn new(secret_key: Bytes32, salt: Bytes32) -> Self {
        Self { secret_key, salt }
    }

    /// Private state with a random secret key and salt
    pub fn random() -> Self {
        Self::new(rand::random(), rand::random())
    }
}

// Custom serde implementation for binary fields
pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(data))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod hex_array {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(data: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        super::hex_bytes::serialize(data, serializer)
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let vec = super::hex_bytes::deserialize(deserializer)?;
        let len = vec.len();
        vec.try_into().map_err(|_| {
            serde::de::Error::custom(format!("Expected array of length {}, got {}", N, len))
        })
    }
}

// Offer-keyed maps travel as sequences of pairs
pub(crate) mod offer_pairs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S, K, V>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        K: Serialize,
        V: Serialize,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D, K, V>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
    where
        D: Deserializer<'de>,
        K: Deserialize<'de> + Ord,
        V: Deserialize<'de>,
    {
        let pairs = Vec::<(K, V)>::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
