use super::ZkConfigProvider;
use crate::ledger::hex_bytes;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Proving material of one circuit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkConfig {
    pub circuit_id: String,
    #[serde(with = "hex_bytes")]
    pub prover_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub verifier_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub zkir: Vec<u8>,
}

/// Fetches circuit keys and zkir from a static base URL
pub struct HttpZkConfigProvider {
    http: reqwest::Client,
    base: String,
}

impl HttpZkConfigProvider {
    pub fn new(http: reqwest::Client, base: &str) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn artifact_url(&self, dir: &str, circuit: &str, extension: &str) -> String {
        format!("{}/{dir}/{circuit}.{extension}", self.base)
    }

    async fn fetch(&self, url: String) -> Result<Vec<u8>> {
        let response = self.http.get(&url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ZkConfigProvider for HttpZkConfigProvider {
    async fn get(&self, circuit: &str) -> Result<ZkConfig> {
        debug!(circuit, base = %self.base, "Fetching circuit config");

        let (prover_key, verifier_key, zkir) = tokio::try_join!(
            self.fetch(self.artifact_url("keys", circuit, "prover")),
            self.fetch(self.artifact_url("keys", circuit, "verifier")),
            self.fetch(self.artifact_url("zkir", circuit, "bzkir")),
        )?;

        Ok(ZkConfig {
            circuit_id: circuit.to_string(),
            prover_key,
            verifier_key,
            zkir,
        })
    }
}
