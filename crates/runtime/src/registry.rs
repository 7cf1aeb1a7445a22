//! Observable deployment entries and the registry that tracks them

use crate::contract::ContractSession;
use crate::ledger::ContractAddress;
use crate::RuntimeError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

/// Lifecycle of one resolution
#[derive(Debug, Clone)]
pub enum DeploymentState {
    InProgress,
    Deployed(Arc<ContractSession>),
    Failed(RuntimeError),
}

impl DeploymentState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::InProgress)
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::InProgress => "in-progress",
            Self::Deployed(_) => "deployed",
            Self::Failed(_) => "failed",
        }
    }

    pub fn session(&self) -> Option<&Arc<ContractSession>> {
        match self {
            Self::Deployed(session) => Some(session),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&RuntimeError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// One tracked resolution. Subscribers see the current state immediately and
/// every later transition.
#[derive(Debug)]
pub struct Deployment {
    id: Uuid,
    requested_address: Option<ContractAddress>,
    created_at: DateTime<Utc>,
    state: watch::Sender<DeploymentState>,
}

pub type DeploymentHandle = Arc<Deployment>;

impl Deployment {
    pub(crate) fn new(requested_address: Option<ContractAddress>) -> Self {
        Self::with_state(requested_address, DeploymentState::InProgress)
    }

    pub(crate) fn with_state(
        requested_address: Option<ContractAddress>,
        state: DeploymentState,
    ) -> Self {
        let (state, _) = watch::channel(state);
        Self {
            id: Uuid::new_v4(),
            requested_address,
            created_at: Utc::now(),
            state,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Address passed to `resolve`; `None` for a fresh deployment
    pub fn requested_address(&self) -> Option<&ContractAddress> {
        self.requested_address.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> DeploymentState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DeploymentState> {
        self.state.subscribe()
    }

    /// Address of the deployed contract, once there is one
    pub fn address(&self) -> Option<ContractAddress> {
        self.state
            .borrow()
            .session()
            .map(|session| session.address().clone())
    }

    /// Wait for the entry to leave `InProgress`
    pub async fn settled(&self) -> DeploymentState {
        let mut rx = self.subscribe();
        let state = match rx.wait_for(DeploymentState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        state
    }

    /// Move out of `InProgress`. Settled states are terminal, later calls are ignored.
    pub(crate) fn settle(&self, next: DeploymentState) -> bool {
        let status = next.status();
        let changed = self.state.send_if_modified(|current| {
            if current.is_settled() {
                return false;
            }
            *current = next;
            true
        });

        if changed {
            debug!(id = %self.id, status, "Deployment settled");
        }
        changed
    }
}

/// Append-only list of deployment entries
#[derive(Debug)]
pub struct DeploymentRegistry {
    entries: watch::Sender<Vec<DeploymentHandle>>,
}

impl Default for DeploymentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploymentRegistry {
    pub fn new() -> Self {
        let (entries, _) = watch::channel(Vec::new());
        Self { entries }
    }

    /// Deployed entry whose contract lives at `address`
    pub fn find_deployed(&self, address: &ContractAddress) -> Option<DeploymentHandle> {
        self.entries
            .borrow()
            .iter()
            .find(|entry| entry.address().as_ref() == Some(address))
            .cloned()
    }

    pub fn push(&self, entry: DeploymentHandle) {
        self.entries.send_modify(|entries| entries.push(entry));
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<DeploymentHandle>> {
        self.entries.subscribe()
    }

    pub fn snapshot(&self) -> Vec<DeploymentHandle> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_is_terminal() {
        let entry = Deployment::new(Some(ContractAddress::new("0xDEAD")));
        assert_eq!(entry.state().status(), "in-progress");

        let not_found = RuntimeError::ContractNotFound(ContractAddress::new("0xDEAD"));
        assert!(entry.settle(DeploymentState::Failed(not_found)));
        assert!(!entry.settle(DeploymentState::Failed(RuntimeError::Closed)));

        let state = entry.settled().await;
        assert!(matches!(
            state.error(),
            Some(RuntimeError::ContractNotFound(_))
        ));
        assert!(entry.address().is_none());
    }

    #[tokio::test]
    async fn test_subscribers_see_current_and_next_state() {
        let entry = Arc::new(Deployment::new(None));
        let mut early = entry.subscribe();
        assert_eq!(early.borrow_and_update().status(), "in-progress");

        let waiter = {
            let entry = entry.clone();
            tokio::spawn(async move { entry.settled().await })
        };

        entry.settle(DeploymentState::Failed(RuntimeError::Closed));

        early.changed().await.unwrap();
        assert_eq!(early.borrow().status(), "failed");

        let late = entry.subscribe();
        assert_eq!(late.borrow().status(), "failed");

        assert_eq!(waiter.await.unwrap().status(), "failed");
    }

    #[tokio::test]
    async fn test_settled_returns_terminal_state_without_waiting() {
        let entry = Deployment::with_state(None, DeploymentState::Failed(RuntimeError::Timeout));

        let first = entry.settled().await;
        let second = entry.settled().await;

        assert!(matches!(first.error(), Some(RuntimeError::Timeout)));
        assert_eq!(second.status(), "failed");
    }

    #[test]
    fn test_registry_is_append_only_and_observable() {
        let registry = DeploymentRegistry::new();
        let mut list = registry.subscribe();
        assert!(registry.is_empty());

        let first = Arc::new(Deployment::new(None));
        let second = Arc::new(Deployment::new(Some(ContractAddress::new("abc"))));
        registry.push(first.clone());
        registry.push(second.clone());

        assert!(list.has_changed().unwrap());
        let entries = list.borrow_and_update().clone();
        assert_eq!(entries.len(), 2);
        assert!(Arc::ptr_eq(&entries[0], &first));
        assert_ne!(entries[0].id(), entries[1].id());
        assert_eq!(entries[1].requested_address(), Some(&ContractAddress::new("abc")));
    }

    #[test]
    fn test_find_ignores_unsettled_entries() {
        let registry = DeploymentRegistry::new();
        registry.push(Arc::new(Deployment::new(Some(ContractAddress::new("abc")))));

        assert!(registry.find_deployed(&ContractAddress::new("abc")).is_none());
    }
}
