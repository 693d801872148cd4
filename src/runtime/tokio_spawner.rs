//! Tokio runtime spawner implementation.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::core::{MapError, Spawn};

/// A runtime owned by a spawner. Shut down without blocking when the last
/// spawner clone goes away, which may happen on one of its own threads.
struct OwnedRuntime(Option<tokio::runtime::Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

/// Tokio-based spawner that executes worker futures on a tokio runtime.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
    /// Keeps a dedicated runtime alive; `None` when borrowing someone else's.
    owned: Option<Arc<OwnedRuntime>>,
}

impl TokioSpawner {
    /// Create a spawner from a tokio runtime handle.
    pub const fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle, owned: None }
    }

    /// Spawner on the runtime the caller is running in.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }

    /// Spawner on the runtime the caller is running in, if any.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Runtime`] when called outside a tokio runtime.
    pub fn try_current() -> Result<Self, MapError> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|e| MapError::Runtime(e.to_string()))
    }

    /// Create a spawner with its own multi-threaded runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::Runtime`] when `worker_threads` is zero or the
    /// runtime cannot be built.
    pub fn with_worker_threads(worker_threads: usize) -> Result<Self, MapError> {
        if worker_threads == 0 {
            return Err(MapError::Runtime("worker_threads must be greater than 0".into()));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name("async-map-worker")
            .enable_all()
            .build()
            .map_err(|e| MapError::Runtime(e.to_string()))?;
        debug!(worker_threads, "started dedicated runtime");
        Ok(Self {
            handle: runtime.handle().clone(),
            owned: Some(Arc::new(OwnedRuntime(Some(runtime)))),
        })
    }

    /// Handle of the runtime tasks are spawned on.
    pub const fn handle(&self) -> &tokio::runtime::Handle {
        &self.handle
    }

    /// Whether this spawner owns its runtime.
    pub const fn is_dedicated(&self) -> bool {
        self.owned.is_some()
    }
}

impl std::fmt::Debug for TokioSpawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioSpawner")
            .field("dedicated", &self.is_dedicated())
            .finish_non_exhaustive()
    }
}

impl Spawn for TokioSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(fut);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_current_outside_runtime() {
        assert!(matches!(TokioSpawner::try_current(), Err(MapError::Runtime(_))));
    }

    #[test]
    fn test_zero_worker_threads_rejected() {
        assert!(TokioSpawner::with_worker_threads(0).is_err());
    }

    #[test]
    fn test_dedicated_runtime_runs_spawned_work() {
        let spawner = TokioSpawner::with_worker_threads(2).unwrap();
        assert!(spawner.is_dedicated());
        let (tx, rx) = futures::channel::oneshot::channel();
        spawner.spawn(async move {
            let _ = tx.send(42_u32);
        });
        assert_eq!(futures::executor::block_on(rx).unwrap(), 42);
    }

    #[tokio::test]
    async fn test_current_borrows_ambient_runtime() {
        let spawner = TokioSpawner::current();
        assert!(!spawner.is_dedicated());
        let (tx, rx) = futures::channel::oneshot::channel();
        spawner.spawn(async move {
            let _ = tx.send("ran");
        });
        assert_eq!(rx.await.unwrap(), "ran");
    }
}
