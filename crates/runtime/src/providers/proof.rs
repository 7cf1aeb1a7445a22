use super::{ProofProvider, ZkConfig};
use crate::ledger::hex_bytes;
use crate::transaction::{UnbalancedTransaction, UnprovenTransaction};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ProveRequest<'a> {
    tx: &'a UnprovenTransaction,
    zk_config: Option<&'a ZkConfig>,
}

#[derive(Debug, Deserialize)]
struct ProveResponse {
    #[serde(with = "hex_bytes")]
    proof: Vec<u8>,
}

/// Client of the proof server
pub struct HttpProofProvider {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpProofProvider {
    pub fn new(http: reqwest::Client, uri: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/prove", uri.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl ProofProvider for HttpProofProvider {
    async fn prove(
        &self,
        tx: UnprovenTransaction,
        zk_config: Option<ZkConfig>,
    ) -> Result<UnbalancedTransaction> {
        debug!(
            endpoint = %self.endpoint,
            circuit = tx.payload.circuit().unwrap_or("deploy"),
            "Requesting proof"
        );

        let response: ProveResponse = self
            .http
            .post(&self.endpoint)
            .json(&ProveRequest {
                tx: &tx,
                zk_config: zk_config.as_ref(),
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(UnbalancedTransaction {
            payload: tx.payload,
            proof: response.proof,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::ContractAddress;
    use crate::transaction::LedgerTransaction;

    #[test]
    fn test_endpoint() {
        let provider = HttpProofProvider::new(reqwest::Client::new(), "http://localhost:6300/");
        assert_eq!(provider.endpoint, "http://localhost:6300/prove");
    }

    #[test]
    fn test_request_shape() {
        let tx = UnprovenTransaction {
            payload: LedgerTransaction::Call {
                address: ContractAddress::new("abc"),
                circuit: "claim_proceeds".to_string(),
                args: serde_json::Value::Null,
            },
        };
        let request = ProveRequest {
            tx: &tx,
            zk_config: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["tx"]["payload"]["circuit"], "claim_proceeds");
        assert!(json["zk_config"].is_null());

        let response: ProveResponse = serde_json::from_str(r#"{ "proof": "0xbeef" }"#).unwrap();
        assert_eq!(response.proof, vec![0xbe, 0xef]);
    }
}
