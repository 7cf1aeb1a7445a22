//! Single-flight, memoized provider bundle

use super::{ProviderBundle, ProviderFactory};
use crate::connector::{discover_connector, ConnectorSlot};
use crate::core::DiscoveryConfig;
use crate::{Result, RuntimeError};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

type PendingBundle = Shared<BoxFuture<'static, Result<Arc<ProviderBundle>>>>;

/// Holds the one provider bundle of a manager.
///
/// Concurrent callers of [`ProviderCache::get`] share a single discovery and
/// build round. A failed round is kept until the next `get`, which starts over.
pub struct ProviderCache {
    slot: Arc<dyn ConnectorSlot>,
    factory: Arc<dyn ProviderFactory>,
    discovery: DiscoveryConfig,
    pending: Mutex<Option<PendingBundle>>,
}

impl ProviderCache {
    pub fn new(
        slot: Arc<dyn ConnectorSlot>,
        factory: Arc<dyn ProviderFactory>,
        discovery: DiscoveryConfig,
    ) -> Self {
        Self {
            slot,
            factory,
            discovery,
            pending: Mutex::new(None),
        }
    }

    /// Get the bundle, building it if no round is in flight or resolved
    pub async fn get(&self) -> Result<Arc<ProviderBundle>> {
        let pending = {
            let mut guard = self.pending.lock().await;
            match guard.as_ref() {
                Some(pending) if !matches!(pending.peek(), Some(Err(_))) => pending.clone(),
                _ => {
                    let pending = self.start();
                    *guard = Some(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// Drop the memoized bundle so the next `get` rebuilds it
    pub async fn invalidate(&self) {
        if self.pending.lock().await.take().is_some() {
            info!("Provider bundle invalidated");
        }
    }

    fn start(&self) -> PendingBundle {
        let slot = self.slot.clone();
        let factory = self.factory.clone();
        let discovery = self.discovery.clone();

        async move {
            build_bundle(slot, factory, discovery).await.map_err(|e| {
                error!(error = %e, "Provider initialization failed");
                RuntimeError::ProviderInitialization(Box::new(e))
            })
        }
        .boxed()
        .shared()
    }
}

async fn build_bundle(
    slot: Arc<dyn ConnectorSlot>,
    factory: Arc<dyn ProviderFactory>,
    discovery: DiscoveryConfig,
) -> Result<Arc<ProviderBundle>> {
    info!("Initializing providers");
    let session = discover_connector(slot.as_ref(), &discovery).await?;
    let bundle = factory.build(session).await?;
    info!("Providers initialized");
    Ok(Arc::new(bundle))
}
