//! Application-level view of a contract, fused from ledger and private state

use crate::combinator::combine_latest;
use crate::decode::bytes_to_identifier;
use crate::ledger::{
    offer_pairs, AssetPublicInfo, ContractAddress, LedgerState, Offer, QualifiedCoinInfo,
};
use crate::providers::ProviderBundle;
use crate::{Result, RuntimeError};
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{trace, warn};

pub type DerivedStateStream = BoxStream<'static, Result<DerivedState>>;

/// Qualified coin with its binary fields rendered as identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedCoinInfo {
    pub nonce: String,
    pub color: String,
    pub value: u128,
    pub mt_index: u64,
}

impl DecodedCoinInfo {
    pub fn decode(coin: &QualifiedCoinInfo) -> Result<Self> {
        Ok(Self {
            nonce: bytes_to_identifier(&coin.nonce)?,
            color: bytes_to_identifier(&coin.color)?,
            value: coin.value,
            mt_index: coin.mt_index,
        })
    }
}

/// Snapshot handed to consumers; rebuilt on every update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedState {
    pub asset_info: AssetPublicInfo,
    pub expected_coin_type: String,
    pub unit_price: u128,
    pub available_shares: u128,
    #[serde(serialize_with = "offer_pairs::serialize")]
    pub sells: BTreeMap<Offer, DecodedCoinInfo>,
    #[serde(serialize_with = "offer_pairs::serialize")]
    pub claimables: BTreeMap<Offer, DecodedCoinInfo>,
}

impl DerivedState {
    pub fn derive(ledger: &LedgerState) -> Result<Self> {
        Ok(Self {
            asset_info: ledger.asset_info.clone(),
            expected_coin_type: bytes_to_identifier(&ledger.expected_coin_type)?,
            unit_price: ledger.unit_price,
            available_shares: ledger.available_shares,
            sells: decode_offers(&ledger.sells)?,
            claimables: decode_offers(&ledger.claimables)?,
        })
    }
}

fn decode_offers(
    offers: &BTreeMap<Offer, QualifiedCoinInfo>,
) -> Result<BTreeMap<Offer, DecodedCoinInfo>> {
    offers
        .iter()
        .map(|(offer, coin)| Ok((offer.clone(), DecodedCoinInfo::decode(coin)?)))
        .collect()
}

/// Live derived state of the contract at `address`.
///
/// The private state is read once; it does not change while a session lives.
/// Nothing is emitted until both the ledger and the private state read have
/// produced. A missing private state still counts as a read: the derived view
/// only depends on the ledger.
pub async fn derived_state_stream(
    address: &ContractAddress,
    providers: &ProviderBundle,
    private_state_id: &str,
) -> Result<DerivedStateStream> {
    let ledger_states = providers
        .public_data
        .contract_state_stream(address)
        .await?
        .map(|snapshot| -> Result<LedgerState> {
            let ledger = LedgerState::from_contract_state(&snapshot?)?;
            trace!(?ledger, "Ledger state changed");
            Ok(ledger)
        })
        .boxed();

    let private_state = {
        let store = providers.private_state.clone();
        let id = private_state_id.to_string();
        stream::once(async move {
            let state = store.get(&id).await?;
            if state.is_none() {
                warn!(%id, "No private state stored");
            }
            Ok::<_, RuntimeError>(state)
        })
        .boxed()
    };

    Ok(combine_latest(ledger_states, private_state, |ledger, _private| {
        DerivedState::derive(ledger)
    })
    .boxed())
}
