//! The mapping engine: normalization, bridging and scheduling composed into
//! one future-returning `map_limit`.

use std::future::Future;

use tracing::debug;

use crate::core::bridge::{callbackify, deferred, Deferred, Outcome, Promise};
use crate::core::normalize::{IntoIndexed, Shape};
use crate::core::scheduler::schedule;
use crate::core::{Limit, Spawn, TaskError};

/// Entry point for every combinator.
///
/// Holds the spawner that drives worker futures and the limit used by the
/// `*_default` flavors. Cheap to clone when the spawner is.
#[derive(Debug, Clone)]
pub struct Engine<S> {
    spawner: S,
    default_limit: Limit,
}

impl<S> Engine<S> {
    /// Create an engine on `spawner` with an unbounded default limit.
    pub const fn new(spawner: S) -> Self {
        Self {
            spawner,
            default_limit: Limit::Unbounded,
        }
    }

    /// Set the limit used by `map_default` and `for_each_default`.
    #[must_use]
    pub fn with_default_limit(mut self, limit: Limit) -> Self {
        self.default_limit = limit;
        self
    }

    /// Configured default limit.
    pub const fn default_limit(&self) -> Limit {
        self.default_limit
    }

    /// Underlying spawner.
    pub const fn spawner(&self) -> &S {
        &self.spawner
    }
}

#[cfg(feature = "tokio-runtime")]
impl Engine<crate::runtime::TokioSpawner> {
    /// Engine on the ambient Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime, like `tokio::spawn`.
    #[must_use]
    pub fn current() -> Self {
        Self::new(crate::runtime::TokioSpawner::current())
    }
}

impl<S> Engine<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Start a run and report its outcome to `done`.
    ///
    /// Scheduling begins immediately; the run keeps going whether or not
    /// anyone is waiting on it.
    pub(crate) fn start<T, R, E, F, Fut, D>(&self, limit: Limit, f: F, items: Vec<T>, done: D)
    where
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        D: FnOnce(Outcome<Vec<R>, E>) + Send + 'static,
    {
        let worker = callbackify(self.spawner.clone(), f);
        schedule(items, limit, worker, done);
    }

    /// Start a run and return a promise of its ordered results.
    pub(crate) fn run<T, R, E, F, Fut>(&self, limit: Limit, f: F, items: Vec<T>) -> Promise<Vec<R>, E>
    where
        T: Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let Deferred { promise, resolver } = deferred();
        self.start(limit, f, items, move |outcome| {
            resolver.settle(outcome);
        });
        promise
    }

    /// Map `f` over `collection` with at most `limit` calls in flight.
    ///
    /// Results keep the input's order and shape: a `Vec` yields a `Vec`, a
    /// map yields a map with the same keys. The first error is returned as-is
    /// and no partial results are delivered. Calls already running when it
    /// happens are left to finish in the background.
    ///
    /// # Errors
    ///
    /// Returns the first error any call to `f` produced.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from `f` on the awaiting task.
    pub async fn map_limit<C, F, Fut, R, E>(
        &self,
        limit: Limit,
        f: F,
        collection: C,
    ) -> Result<<C::Shape as Shape<R>>::Output, E>
    where
        C: IntoIndexed,
        C::Item: Send + 'static,
        C::Shape: Shape<R>,
        F: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
    {
        let (items, shape) = collection.into_indexed();
        debug!(len = items.len(), limit = %limit, "map_limit");
        let results = self
            .run(limit, f, items)
            .await
            .map_err(TaskError::into_inner)?;
        Ok(shape.reassemble(results))
    }

    /// [`map_limit`](Self::map_limit) with every call dispatched at once.
    ///
    /// # Errors
    ///
    /// Returns the first error any call to `f` produced.
    pub async fn map<C, F, Fut, R, E>(
        &self,
        f: F,
        collection: C,
    ) -> Result<<C::Shape as Shape<R>>::Output, E>
    where
        C: IntoIndexed,
        C::Item: Send + 'static,
        C::Shape: Shape<R>,
        F: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
    {
        self.map_limit(Limit::Unbounded, f, collection).await
    }

    /// [`map_limit`](Self::map_limit) one call at a time.
    ///
    /// # Errors
    ///
    /// Returns the first error any call to `f` produced.
    pub async fn map_series<C, F, Fut, R, E>(
        &self,
        f: F,
        collection: C,
    ) -> Result<<C::Shape as Shape<R>>::Output, E>
    where
        C: IntoIndexed,
        C::Item: Send + 'static,
        C::Shape: Shape<R>,
        F: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
    {
        self.map_limit(Limit::SERIAL, f, collection).await
    }

    /// [`map_limit`](Self::map_limit) at the engine's configured default limit.
    ///
    /// # Errors
    ///
    /// Returns the first error any call to `f` produced.
    pub async fn map_default<C, F, Fut, R, E>(
        &self,
        f: F,
        collection: C,
    ) -> Result<<C::Shape as Shape<R>>::Output, E>
    where
        C: IntoIndexed,
        C::Item: Send + 'static,
        C::Shape: Shape<R>,
        F: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
    {
        self.map_limit(self.default_limit, f, collection).await
    }
}
