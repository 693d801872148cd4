//! Combinators derived from [`Engine::map_limit`].
//!
//! Every operation comes in three flavors: `*_limit` takes an explicit
//! [`Limit`], the bare name runs everything at once, and `*_series` runs one
//! item at a time.
//!
//! `every`, `some` and `find` answer as soon as the result is decided. The
//! rest of the traversal is not cancelled: items already running finish,
//! remaining items are still dispatched, and their outcomes are ignored.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::bridge::{deferred, Deferred};
use crate::core::normalize::{IntoIndexed, Shape};
use crate::core::{Engine, Limit, Spawn, TaskError};

/// Outcome of one item under `all_settled`.
///
/// Serializes as `{"status": "fulfilled", "value": ...}` or
/// `{"status": "rejected", "reason": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Settled<R, E> {
    /// The call succeeded.
    Fulfilled {
        /// Produced value.
        value: R,
    },
    /// The call failed.
    Rejected {
        /// Reported error.
        reason: E,
    },
}

impl<R, E> Settled<R, E> {
    /// Whether the call succeeded.
    pub const fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled { .. })
    }

    /// Back to a plain `Result`.
    pub fn into_result(self) -> Result<R, E> {
        match self {
            Self::Fulfilled { value } => Ok(value),
            Self::Rejected { reason } => Err(reason),
        }
    }
}

impl<R, E> From<Result<R, E>> for Settled<R, E> {
    fn from(result: Result<R, E>) -> Self {
        match result {
            Ok(value) => Self::Fulfilled { value },
            Err(reason) => Self::Rejected { reason },
        }
    }
}

/// Predicate outcome of one item under `find`.
enum Verdict<T> {
    Pending,
    Miss,
    Hit(T),
}

/// Tracks `find` verdicts by index so the answer is the lowest matching
/// index, whatever order the predicates finish in.
struct FindFrontier<T> {
    verdicts: Vec<Verdict<T>>,
    /// Lowest index whose verdict is not a known miss.
    next: usize,
    decided: bool,
}

impl<T> FindFrontier<T> {
    fn new(len: usize) -> Self {
        Self {
            verdicts: std::iter::repeat_with(|| Verdict::Pending).take(len).collect(),
            next: 0,
            decided: false,
        }
    }

    /// Record the verdict for `index`; returns the answer the first time it
    /// becomes known.
    fn record(&mut self, index: usize, verdict: Verdict<T>) -> Option<T> {
        self.verdicts[index] = verdict;
        if self.decided {
            return None;
        }
        while matches!(self.verdicts.get(self.next), Some(Verdict::Miss)) {
            self.next += 1;
        }
        let slot = self.verdicts.get_mut(self.next)?;
        if !matches!(slot, Verdict::Hit(_)) {
            return None;
        }
        self.decided = true;
        match std::mem::replace(slot, Verdict::Miss) {
            Verdict::Hit(item) => Some(item),
            Verdict::Pending | Verdict::Miss => None,
        }
    }
}

impl<S> Engine<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Run `f` on every item for its side effects, then hand back the
    /// original collection.
    ///
    /// # Errors
    ///
    /// Returns the first error any call to `f` produced.
    pub async fn for_each_limit<C, F, Fut, R, E>(&self, limit: Limit, f: F, collection: C) -> Result<C, E>
    where
        C: IntoIndexed + Clone,
        C::Item: Send + 'static,
        F: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
    {
        let (items, _) = collection.clone().into_indexed();
        self.run(limit, f, items)
            .await
            .map_err(TaskError::into_inner)?;
        Ok(collection)
    }

    /// [`for_each_limit`](Self::for_each_limit) with every call at once.
    ///
    /// # Errors
    ///
    /// Returns the first error any call to `f` produced.
    pub async fn for_each<C, F, Fut, R, E>(&self, f: F, collection: C) -> Result<C, E>
    where
        C: IntoIndexed + Clone,
        C::Item: Send + 'static,
        F: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
    {
        self.for_each_limit(Limit::Unbounded, f, collection).await
    }

    /// [`for_each_limit`](Self::for_each_limit) one call at a time.
    ///
    /// # Errors
    ///
    /// Returns the first error any call to `f` produced.
    pub async fn for_each_series<C, F, Fut, R, E>(&self, f: F, collection: C) -> Result<C, E>
    where
        C: IntoIndexed + Clone,
        C::Item: Send + 'static,
        F: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
    {
        self.for_each_limit(Limit::SERIAL, f, collection).await
    }

    /// [`for_each_limit`](Self::for_each_limit) at the engine's default limit.
    ///
    /// # Errors
    ///
    /// Returns the first error any call to `f` produced.
    pub async fn for_each_default<C, F, Fut, R, E>(&self, f: F, collection: C) -> Result<C, E>
    where
        C: IntoIndexed + Clone,
        C::Item: Send + 'static,
        F: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
    {
        self.for_each_limit(self.default_limit(), f, collection).await
    }

    /// Whether `pred` holds for every item.
    ///
    /// Answers `false` as soon as one item fails the predicate, without
    /// waiting for the rest.
    ///
    /// # Errors
    ///
    /// Returns the first predicate error seen before the answer was known.
    pub async fn every_limit<C, P, Fut, E>(&self, limit: Limit, pred: P, collection: C) -> Result<bool, E>
    where
        C: IntoIndexed,
        C::Item: Send + 'static,
        P: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, E>> + Send + 'static,
        E: Send + 'static,
    {
        self.decide(limit, pred, collection, false).await
    }

    /// [`every_limit`](Self::every_limit) with every call at once.
    ///
    /// # Errors
    ///
    /// Returns the first predicate error seen before the answer was known.
    pub async fn every<C, P, Fut, E>(&self, pred: P, collection: C) -> Result<bool, E>
    where
        C: IntoIndexed,
        C::Item: Send + 'static,
        P: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, E>> + Send + 'static,
        E: Send + 'static,
    {
        self.every_limit(Limit::Unbounded, pred, collection).await
    }

    /// [`every_limit`](Self::every_limit) one call at a time.
    ///
    /// # Errors
    ///
    /// Returns the first predicate error seen before the answer was known.
    pub async fn every_series<C, P, Fut, E>(&self, pred: P, collection: C) -> Result<bool, E>
    where
        C: IntoIndexed,
        C::Item: Send + 'static,
        P: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, E>> + Send + 'static,
        E: Send + 'static,
    {
        self.every_limit(Limit::SERIAL, pred, collection).await
    }

    /// Whether `pred` holds for at least one item.
    ///
    /// Answers `true` as soon as one item passes, without waiting for the
    /// rest.
    ///
    /// # Errors
    ///
    /// Returns the first predicate error seen before the answer was known.
    pub async fn some_limit<C, P, Fut, E>(&self, limit: Limit, pred: P, collection: C) -> Result<bool, E>
    where
        C: IntoIndexed,
        C::Item: Send + 'static,
        P: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, E>> + Send + 'static,
        E: Send + 'static,
    {
        self.decide(limit, pred, collection, true).await
    }

    /// [`some_limit`](Self::some_limit) with every call at once.
    ///
    /// # Errors
    ///
    /// Returns the first predicate error seen before the answer was known.
    pub async fn some<C, P, Fut, E>(&self, pred: P, collection: C) -> Result<bool, E>
    where
        C: IntoIndexed,
        C::Item: Send + 'static,
        P: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, E>> + Send + 'static,
        E: Send + 'static,
    {
        self.some_limit(Limit::Unbounded, pred, collection).await
    }

    /// [`some_limit`](Self::some_limit) one call at a time.
    ///
    /// # Errors
    ///
    /// Returns the first predicate error seen before the answer was known.
    pub async fn some_series<C, P, Fut, E>(&self, pred: P, collection: C) -> Result<bool, E>
    where
        C: IntoIndexed,
        C::Item: Send + 'static,
        P: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, E>> + Send + 'static,
        E: Send + 'static,
    {
        self.some_limit(Limit::SERIAL, pred, collection).await
    }

    /// Shared body of `every` and `some`: answer `decisive` as soon as one
    /// predicate returns it, `!decisive` once the traversal ends without one.
    async fn decide<C, P, Fut, E>(&self, limit: Limit, pred: P, collection: C, decisive: bool) -> Result<bool, E>
    where
        C: IntoIndexed,
        C::Item: Send + 'static,
        P: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, E>> + Send + 'static,
        E: Send + 'static,
    {
        let (items, _) = collection.into_indexed();
        let Deferred { promise, resolver } = deferred::<bool, E>();
        let early = resolver.clone();

        let check = move |item: C::Item| {
            let verdict = pred(item);
            let early = early.clone();
            async move {
                if verdict.await? == decisive {
                    early.resolve(decisive);
                }
                Ok::<(), E>(())
            }
        };

        self.start(limit, check, items, move |outcome| {
            match outcome {
                Ok(_) => resolver.resolve(!decisive),
                Err(error) => resolver.settle(Err(error)),
            };
        });

        promise.await.map_err(TaskError::into_inner)
    }

    /// First item, in input order, for which `pred` holds.
    ///
    /// Answers as soon as a matching item and every item before it have been
    /// checked, without waiting for later items; `None` once every item was
    /// checked without a match.
    ///
    /// # Errors
    ///
    /// Returns the first predicate error seen before the answer was known.
    pub async fn find_limit<C, P, Fut, E>(&self, limit: Limit, pred: P, collection: C) -> Result<Option<C::Item>, E>
    where
        C: IntoIndexed,
        C::Item: Clone + Send + 'static,
        P: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, E>> + Send + 'static,
        E: Send + 'static,
    {
        let (items, _) = collection.into_indexed();
        let frontier = Arc::new(Mutex::new(FindFrontier::new(items.len())));
        let Deferred { promise, resolver } = deferred::<Option<C::Item>, E>();
        let early = resolver.clone();

        let check = move |(index, item): (usize, C::Item)| {
            let verdict = pred(item.clone());
            let early = early.clone();
            let frontier = Arc::clone(&frontier);
            async move {
                let verdict = if verdict.await? {
                    Verdict::Hit(item)
                } else {
                    Verdict::Miss
                };
                let answer = frontier.lock().record(index, verdict);
                if let Some(found) = answer {
                    early.resolve(Some(found));
                }
                Ok::<(), E>(())
            }
        };

        let indexed: Vec<_> = items.into_iter().enumerate().collect();
        self.start(limit, check, indexed, move |outcome| {
            match outcome {
                Ok(_) => resolver.resolve(None),
                Err(error) => resolver.settle(Err(error)),
            };
        });

        promise.await.map_err(TaskError::into_inner)
    }

    /// [`find_limit`](Self::find_limit) with every call at once.
    ///
    /// # Errors
    ///
    /// Returns the first predicate error seen before a match was found.
    pub async fn find<C, P, Fut, E>(&self, pred: P, collection: C) -> Result<Option<C::Item>, E>
    where
        C: IntoIndexed,
        C::Item: Clone + Send + 'static,
        P: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, E>> + Send + 'static,
        E: Send + 'static,
    {
        self.find_limit(Limit::Unbounded, pred, collection).await
    }

    /// [`find_limit`](Self::find_limit) one call at a time.
    ///
    /// # Errors
    ///
    /// Returns the first predicate error seen before a match was found.
    pub async fn find_series<C, P, Fut, E>(&self, pred: P, collection: C) -> Result<Option<C::Item>, E>
    where
        C: IntoIndexed,
        C::Item: Clone + Send + 'static,
        P: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, E>> + Send + 'static,
        E: Send + 'static,
    {
        self.find_limit(Limit::SERIAL, pred, collection).await
    }

    /// Map each item to a sequence and concatenate the sequences in input
    /// order, one level deep.
    ///
    /// # Errors
    ///
    /// Returns the first error any call to `f` produced.
    pub async fn flat_map_limit<C, F, Fut, I, E>(&self, limit: Limit, f: F, collection: C) -> Result<Vec<I::Item>, E>
    where
        C: IntoIndexed,
        C::Item: Send + 'static,
        F: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<I, E>> + Send + 'static,
        I: IntoIterator + Send + 'static,
        E: Send + 'static,
    {
        let (items, _) = collection.into_indexed();
        let nested = self
            .run(limit, f, items)
            .await
            .map_err(TaskError::into_inner)?;
        Ok(nested.into_iter().flatten().collect())
    }

    /// [`flat_map_limit`](Self::flat_map_limit) with every call at once.
    ///
    /// # Errors
    ///
    /// Returns the first error any call to `f` produced.
    pub async fn flat_map<C, F, Fut, I, E>(&self, f: F, collection: C) -> Result<Vec<I::Item>, E>
    where
        C: IntoIndexed,
        C::Item: Send + 'static,
        F: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<I, E>> + Send + 'static,
        I: IntoIterator + Send + 'static,
        E: Send + 'static,
    {
        self.flat_map_limit(Limit::Unbounded, f, collection).await
    }

    /// [`flat_map_limit`](Self::flat_map_limit) one call at a time.
    ///
    /// # Errors
    ///
    /// Returns the first error any call to `f` produced.
    pub async fn flat_map_series<C, F, Fut, I, E>(&self, f: F, collection: C) -> Result<Vec<I::Item>, E>
    where
        C: IntoIndexed,
        C::Item: Send + 'static,
        F: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<I, E>> + Send + 'static,
        I: IntoIterator + Send + 'static,
        E: Send + 'static,
    {
        self.flat_map_limit(Limit::SERIAL, f, collection).await
    }

    /// Items for which `pred` holds, in input order.
    ///
    /// # Errors
    ///
    /// Returns the first predicate error.
    pub async fn filter_limit<C, P, Fut, E>(&self, limit: Limit, pred: P, collection: C) -> Result<Vec<C::Item>, E>
    where
        C: IntoIndexed,
        C::Item: Clone + Send + 'static,
        P: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, E>> + Send + 'static,
        E: Send + 'static,
    {
        let keep = move |item: C::Item| {
            let verdict = pred(item.clone());
            async move {
                Ok::<_, E>(if verdict.await? { vec![item] } else { Vec::new() })
            }
        };
        self.flat_map_limit(limit, keep, collection).await
    }

    /// [`filter_limit`](Self::filter_limit) with every call at once.
    ///
    /// # Errors
    ///
    /// Returns the first predicate error.
    pub async fn filter<C, P, Fut, E>(&self, pred: P, collection: C) -> Result<Vec<C::Item>, E>
    where
        C: IntoIndexed,
        C::Item: Clone + Send + 'static,
        P: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, E>> + Send + 'static,
        E: Send + 'static,
    {
        self.filter_limit(Limit::Unbounded, pred, collection).await
    }

    /// [`filter_limit`](Self::filter_limit) one call at a time.
    ///
    /// # Errors
    ///
    /// Returns the first predicate error.
    pub async fn filter_series<C, P, Fut, E>(&self, pred: P, collection: C) -> Result<Vec<C::Item>, E>
    where
        C: IntoIndexed,
        C::Item: Clone + Send + 'static,
        P: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, E>> + Send + 'static,
        E: Send + 'static,
    {
        self.filter_limit(Limit::SERIAL, pred, collection).await
    }

    /// Run `f` on every item and record each outcome instead of stopping at
    /// the first error. Never fails.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from `f` on the awaiting task; panics are not
    /// settled.
    pub async fn all_settled_limit<C, F, Fut, R, E>(
        &self,
        limit: Limit,
        f: F,
        collection: C,
    ) -> <C::Shape as Shape<Settled<R, E>>>::Output
    where
        C: IntoIndexed,
        C::Item: Send + 'static,
        C::Shape: Shape<Settled<R, E>>,
        F: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
    {
        let settle = move |item: C::Item| {
            let attempt = f(item);
            async move { Ok::<_, Infallible>(Settled::from(attempt.await)) }
        };
        match self.map_limit(limit, settle, collection).await {
            Ok(settled) => settled,
            Err(never) => match never {},
        }
    }

    /// [`all_settled_limit`](Self::all_settled_limit) with every call at once.
    pub async fn all_settled<C, F, Fut, R, E>(&self, f: F, collection: C) -> <C::Shape as Shape<Settled<R, E>>>::Output
    where
        C: IntoIndexed,
        C::Item: Send + 'static,
        C::Shape: Shape<Settled<R, E>>,
        F: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
    {
        self.all_settled_limit(Limit::Unbounded, f, collection).await
    }

    /// [`all_settled_limit`](Self::all_settled_limit) one call at a time.
    pub async fn all_settled_series<C, F, Fut, R, E>(&self, f: F, collection: C) -> <C::Shape as Shape<Settled<R, E>>>::Output
    where
        C: IntoIndexed,
        C::Item: Send + 'static,
        C::Shape: Shape<Settled<R, E>>,
        F: Fn(C::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
    {
        self.all_settled_limit(Limit::SERIAL, f, collection).await
    }

    /// Settle a list of already-built futures.
    pub async fn all_settled_futures<Fut, R, E>(&self, futures: Vec<Fut>) -> Vec<Settled<R, E>>
    where
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
    {
        self.all_settled(|fut: Fut| fut, futures).await
    }
}
