//! Store adapter: lazily connected, shared or caller-scoped backend handle.

use kg_types::{Connector, GraphBackend, GraphQuery, Row, StoreError};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

enum Handle {
    /// Process-wide handle. Initialized once, never torn down by `disconnect`.
    Shared(Arc<OnceCell<Arc<dyn GraphBackend>>>),
    /// Caller-scoped handle; `disconnect` closes and drops it.
    Private(Mutex<Option<Arc<dyn GraphBackend>>>),
}

/// Executes bounded graph queries against whatever backend the connector yields.
///
/// Concurrent first callers of [`connect`](Self::connect) on a shared adapter
/// race on a single `OnceCell`, so exactly one backend handle is created. A
/// failed connect leaves the cell empty and the next call retries.
pub struct StoreAdapter {
    connector: Option<Arc<dyn Connector>>,
    handle: Handle,
}

impl StoreAdapter {
    /// Adapter over a process-wide handle. Inject it (behind an `Arc`) into
    /// every service that needs the store.
    pub fn shared(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector: Some(connector),
            handle: Handle::Shared(Arc::new(OnceCell::new())),
        }
    }

    /// Adapter owning its own handle, released by [`disconnect`](Self::disconnect).
    pub fn private(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector: Some(connector),
            handle: Handle::Private(Mutex::new(None)),
        }
    }

    /// Adapter with no store behind it: every query fails with `Unavailable`.
    pub fn unconfigured() -> Self {
        Self {
            connector: None,
            handle: Handle::Shared(Arc::new(OnceCell::new())),
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self.handle, Handle::Shared(_))
    }

    /// Establish (or reuse) the backend handle.
    pub async fn connect(&self) -> Result<Arc<dyn GraphBackend>, StoreError> {
        let connector = self
            .connector
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("no graph store configured".to_string()))?;
        match &self.handle {
            Handle::Shared(cell) => cell
                .get_or_try_init(|| async {
                    tracing::info!("opening shared graph store handle");
                    connector.connect().await
                })
                .await
                .cloned(),
            Handle::Private(slot) => {
                let mut guard = slot.lock().await;
                if let Some(backend) = guard.as_ref() {
                    return Ok(Arc::clone(backend));
                }
                tracing::debug!("opening private graph store handle");
                let backend = connector.connect().await?;
                *guard = Some(Arc::clone(&backend));
                Ok(backend)
            }
        }
    }

    /// Run one query. An empty result is `Ok(vec![])`.
    pub async fn run(&self, query: &GraphQuery) -> Result<Vec<Row>, StoreError> {
        let backend = self.connect().await?;
        backend.execute(query).await
    }

    /// Release a caller-scoped handle. No-op for the shared handle.
    pub async fn disconnect(&self) {
        match &self.handle {
            Handle::Shared(_) => {
                tracing::trace!("disconnect ignored for shared graph store handle");
            }
            Handle::Private(slot) => {
                let taken = slot.lock().await.take();
                if let Some(backend) = taken {
                    backend.close().await;
                }
            }
        }
    }

    /// Process-level teardown. Closes the shared handle if one was opened.
    pub async fn shutdown(&self) {
        match &self.handle {
            Handle::Shared(cell) => {
                if let Some(backend) = cell.get() {
                    tracing::info!("closing shared graph store handle");
                    backend.close().await;
                }
            }
            Handle::Private(_) => self.disconnect().await,
        }
    }

    /// Whether a backend handle is open or can be opened right now.
    pub async fn is_available(&self) -> bool {
        self.connect().await.is_ok()
    }
}
