use super::TransactionProvider;
use crate::connector::{WalletSession, WalletState};
use crate::ledger::{Bytes32, CoinInfo};
use crate::transaction::{BalancedTransaction, TransactionId, UnbalancedTransaction};
use crate::{Result, RuntimeError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Delegates balancing and submission to the connector's signer session
pub struct WalletTransactionProvider {
    wallet: Arc<dyn WalletSession>,
    state: WalletState,
}

impl WalletTransactionProvider {
    pub fn new(wallet: Arc<dyn WalletSession>, state: WalletState) -> Self {
        Self { wallet, state }
    }
}

#[async_trait]
impl TransactionProvider for WalletTransactionProvider {
    fn coin_public_key(&self) -> Bytes32 {
        self.state.coin_public_key
    }

    fn encryption_public_key(&self) -> Bytes32 {
        self.state.encryption_public_key
    }

    async fn balance_tx(
        &self,
        tx: UnbalancedTransaction,
        new_coins: Vec<CoinInfo>,
    ) -> Result<BalancedTransaction> {
        debug!(address = %tx.payload.address(), new_coins = new_coins.len(), "Balancing transaction");
        self.wallet.balance_and_prove(tx, new_coins).await
    }

    async fn submit_tx(&self, tx: BalancedTransaction) -> Result<TransactionId> {
        let address = tx.payload.address().clone();
        let tx_id = self
            .wallet
            .submit(tx)
            .await
            .map_err(|e| RuntimeError::TransactionRejected(e.to_string()))?;

        info!(%address, %tx_id, "Transaction submitted");
        Ok(tx_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::MockWalletSession;
    use crate::ledger::ContractAddress;
    use crate::transaction::LedgerTransaction;

    fn balanced() -> BalancedTransaction {
        BalancedTransaction {
            payload: LedgerTransaction::Call {
                address: ContractAddress::new("abc"),
                circuit: "buy_offer".to_string(),
                args: serde_json::Value::Null,
            },
            proof: vec![1, 2, 3],
            new_coins: Vec::new(),
        }
    }

    fn wallet_state() -> WalletState {
        WalletState {
            coin_public_key: [3u8; 32],
            encryption_public_key: [4u8; 32],
        }
    }

    #[tokio::test]
    async fn test_keys_come_from_wallet_state() {
        let provider = WalletTransactionProvider::new(Arc::new(MockWalletSession::new()), wallet_state());

        assert_eq!(provider.coin_public_key(), [3u8; 32]);
        assert_eq!(provider.encryption_public_key(), [4u8; 32]);
    }

    #[tokio::test]
    async fn test_submit_failure_is_rejection() {
        let mut wallet = MockWalletSession::new();
        wallet
            .expect_submit()
            .times(1)
            .returning(|_| Err(RuntimeError::Network("connection reset".to_string())));

        let provider = WalletTransactionProvider::new(Arc::new(wallet), wallet_state());
        let err = provider.submit_tx(balanced()).await.unwrap_err();

        assert!(matches!(err, RuntimeError::TransactionRejected(ref msg) if msg.contains("connection reset")));
    }

    #[tokio::test]
    async fn test_submit_returns_wallet_tx_id() {
        let mut wallet = MockWalletSession::new();
        wallet
            .expect_submit()
            .returning(|_| Ok(TransactionId("tx-9".to_string())));

        let provider = WalletTransactionProvider::new(Arc::new(wallet), wallet_state());
        assert_eq!(provider.submit_tx(balanced()).await.unwrap().0, "tx-9");
    }
}
