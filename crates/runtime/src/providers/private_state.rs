use super::PrivateStateProvider;
use crate::ledger::ContractPrivateState;
use crate::{Result, RuntimeError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Private state kept as one JSON document per id under `<dir>/<store>/`.
///
/// Writes within one provider are serialized; each write stages into its own
/// file before the rename.
pub struct FilePrivateStateProvider {
    root: PathBuf,
    writes: Mutex<()>,
}

impl FilePrivateStateProvider {
    pub fn new(dir: impl AsRef<Path>, store: &str) -> Result<Self> {
        validate_name(store)?;
        Ok(Self {
            root: dir.as_ref().join(store),
            writes: Mutex::new(()),
        })
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        validate_name(id)?;
        Ok(self.root.join(format!("{id}.json")))
    }

    async fn read(&self, path: &Path) -> Result<Option<ContractPrivateState>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // Caller holds `writes`
    async fn write(&self, id: &str, path: &Path, state: &ContractPrivateState) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;

        // Write then rename so readers never see a partial document
        let staging = self
            .root
            .join(format!(".{id}.{:016x}.tmp", rand::random::<u64>()));
        tokio::fs::write(&staging, serde_json::to_vec_pretty(state)?).await?;
        if let Err(e) = tokio::fs::rename(&staging, path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        debug!(id, path = %path.display(), "Private state stored");
        Ok(())
    }
}

#[async_trait]
impl PrivateStateProvider for FilePrivateStateProvider {
    async fn get(&self, id: &str) -> Result<Option<ContractPrivateState>> {
        let path = self.path_for(id)?;
        self.read(&path).await
    }

    async fn set(&self, id: &str, state: ContractPrivateState) -> Result<()> {
        let path = self.path_for(id)?;
        let _guard = self.writes.lock().await;
        self.write(id, &path, &state).await
    }

    async fn get_or_insert(
        &self,
        id: &str,
        candidate: ContractPrivateState,
    ) -> Result<ContractPrivateState> {
        let path = self.path_for(id)?;
        let _guard = self.writes.lock().await;

        if let Some(existing) = self.read(&path).await? {
            return Ok(existing);
        }
        self.write(id, &path, &candidate).await?;
        Ok(candidate)
    }
}

/// Process-local private state that is lost on exit
#[derive(Default)]
pub struct MemoryPrivateStateProvider {
    states: RwLock<HashMap<String, ContractPrivateState>>,
}

impl MemoryPrivateStateProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrivateStateProvider for MemoryPrivateStateProvider {
    async fn get(&self, id: &str) -> Result<Option<ContractPrivateState>> {
        Ok(self.states.read().await.get(id).cloned())
    }

    async fn set(&self, id: &str, state: ContractPrivateState) -> Result<()> {
        self.states.write().await.insert(id.to_string(), state);
        Ok(())
    }

    async fn get_or_insert(
        &self,
        id: &str,
        candidate: ContractPrivateState,
    ) -> Result<ContractPrivateState> {
        Ok(self
            .states
            .write()
            .await
            .entry(id.to_string())
            .or_insert(candidate)
            .clone())
    }
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !name.starts_with('.');

    if valid {
        Ok(())
    } else {
        Err(RuntimeError::Storage(format!("invalid store or state name '{name}'")))
    }
}
