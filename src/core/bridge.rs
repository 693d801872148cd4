//! Conversions between error-first callbacks and futures.
//!
//! The scheduler speaks callbacks: every worker receives a [`Callback`] and
//! reports its outcome through it exactly once. Callers speak futures. This
//! module converts in both directions:
//!
//! - [`from_callback`] / [`promisify`] turn a callback-style function into a
//!   future-returning one.
//! - [`callbackify`] turns a future-returning function into a callback-style
//!   worker by spawning the future and forwarding its result.
//! - [`deferred`] hands out a future together with a [`Resolver`] that can
//!   settle it from anywhere.
//!
//! # Example
//!
//! ```rust
//! use prometheus_async_map::core::bridge::{deferred, Deferred};
//!
//! # futures::executor::block_on(async {
//! let Deferred { promise, resolver } = deferred::<u32, String>();
//! assert!(resolver.resolve(7));
//! assert!(!resolver.reject("too late".into()));
//! assert_eq!(promise.await.unwrap(), 7);
//! # });
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::FutureExt;
use parking_lot::Mutex;

use crate::core::error::panic_message;
use crate::core::{Spawn, TaskError};

/// Result of one task: its value, or why it produced none.
pub type Outcome<T, E> = Result<T, TaskError<E>>;

type Settle<T, E> = Box<dyn FnOnce(Outcome<T, E>) + Send>;

/// Error-first completion handle handed to a callback-style worker.
///
/// Consuming it fires the underlying continuation. Dropping it unfired
/// reports [`TaskError::Lost`], so whoever waits on it is never left hanging.
pub struct Callback<T, E> {
    settle: Option<Settle<T, E>>,
}

impl<T, E> Callback<T, E> {
    /// Wrap a continuation.
    pub fn new<F>(settle: F) -> Self
    where
        F: FnOnce(Outcome<T, E>) + Send + 'static,
    {
        Self {
            settle: Some(Box::new(settle)),
        }
    }

    /// Report a worker result.
    pub fn complete(self, result: Result<T, E>) {
        self.settle(result.map_err(TaskError::Failed));
    }

    /// Report success.
    pub fn ok(self, value: T) {
        self.settle(Ok(value));
    }

    /// Report failure.
    pub fn err(self, error: E) {
        self.settle(Err(TaskError::Failed(error)));
    }

    /// Report a full outcome, including panics.
    pub fn settle(mut self, outcome: Outcome<T, E>) {
        if let Some(settle) = self.settle.take() {
            settle(outcome);
        }
    }
}

impl<T, E> Drop for Callback<T, E> {
    fn drop(&mut self) {
        if let Some(settle) = self.settle.take() {
            settle(Err(TaskError::Lost));
        }
    }
}

impl<T, E> std::fmt::Debug for Callback<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callback")
            .field("fired", &self.settle.is_none())
            .finish()
    }
}

/// Future side of a [`Deferred`].
///
/// Resolves to [`TaskError::Lost`] if every [`Resolver`] is dropped before
/// settling it.
#[must_use = "futures do nothing unless polled"]
#[derive(Debug)]
pub struct Promise<T, E> {
    rx: oneshot::Receiver<Outcome<T, E>>,
}

impl<T, E> Future for Promise<T, E> {
    type Output = Outcome<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(TaskError::Lost)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Settles a [`Promise`] from outside. Cloneable; the first settle wins.
#[derive(Debug)]
pub struct Resolver<T, E> {
    tx: Arc<Mutex<Option<oneshot::Sender<Outcome<T, E>>>>>,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T, E> Resolver<T, E> {
    /// Fulfill the promise. Returns `false` if it was already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Reject the promise. Returns `false` if it was already settled.
    pub fn reject(&self, error: E) -> bool {
        self.settle(Err(TaskError::Failed(error)))
    }

    /// Settle with a full outcome. Returns `false` if already settled.
    pub fn settle(&self, outcome: Outcome<T, E>) -> bool {
        let Some(tx) = self.tx.lock().take() else {
            return false;
        };
        // The promise may have been dropped; settling still counts.
        let _ = tx.send(outcome);
        true
    }

    /// Whether some resolver already settled the promise.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.tx.lock().is_none()
    }
}

/// A promise and the handle that settles it.
#[derive(Debug)]
pub struct Deferred<T, E> {
    /// Awaitable side.
    pub promise: Promise<T, E>,
    /// Settling side.
    pub resolver: Resolver<T, E>,
}

/// Create an externally-resolvable promise.
pub fn deferred<T, E>() -> Deferred<T, E> {
    let (tx, rx) = oneshot::channel();
    Deferred {
        promise: Promise { rx },
        resolver: Resolver {
            tx: Arc::new(Mutex::new(Some(tx))),
        },
    }
}

/// Invoke `f` once with a fresh [`Callback`] and return a future of what it
/// reports.
pub fn from_callback<T, E, F>(f: F) -> Promise<T, E>
where
    F: FnOnce(Callback<T, E>),
    T: Send + 'static,
    E: Send + 'static,
{
    let Deferred { promise, resolver } = deferred();
    f(Callback::new(move |outcome| {
        resolver.settle(outcome);
    }));
    promise
}

/// Turn `f(arg, callback)` into `g(arg) -> future`.
pub fn promisify<A, T, E, F>(f: F) -> impl Fn(A) -> Promise<T, E>
where
    F: Fn(A, Callback<T, E>),
    T: Send + 'static,
    E: Send + 'static,
{
    move |arg| from_callback(|callback| f(arg, callback))
}

/// Turn `f(arg) -> future` into a callback-style worker `g(arg, callback)`.
///
/// The future is spawned on `spawner`; its result is forwarded to the
/// callback from the spawned task. A panic raised by `f` itself or while
/// polling the future is forwarded as [`TaskError::Panicked`]. Either way
/// the callback fires exactly once and never on the caller's stack.
pub fn callbackify<A, T, E, F, Fut, S>(spawner: S, f: F) -> impl Fn(A, Callback<T, E>)
where
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    S: Spawn,
    T: Send + 'static,
    E: Send + 'static,
{
    move |arg, callback| match std::panic::catch_unwind(AssertUnwindSafe(|| f(arg))) {
        Ok(fut) => spawner.spawn(async move {
            let outcome = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(result) => result.map_err(TaskError::Failed),
                Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
            };
            callback.settle(outcome);
        }),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            spawner.spawn(async move {
                callback.settle(Err(TaskError::Panicked(message)));
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Runs spawned futures inline; good enough for unit tests.
    struct InlineSpawner;

    impl Spawn for InlineSpawner {
        fn spawn<F>(&self, fut: F)
        where
            F: Future<Output = ()> + Send + 'static,
        {
            block_on(fut);
        }
    }

    #[test]
    fn test_callback_fires_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cb: Callback<u8, ()> = Callback::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        cb.ok(1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_callback_reports_lost() {
        let promise = from_callback::<u8, (), _>(drop);
        assert!(matches!(block_on(promise), Err(TaskError::Lost)));
    }

    #[test]
    fn test_from_callback_ok_and_err() {
        let ok = from_callback::<u8, String, _>(|cb| cb.complete(Ok(3)));
        assert_eq!(block_on(ok).unwrap(), 3);

        let err = from_callback::<u8, String, _>(|cb| cb.err("nope".into()));
        assert_eq!(block_on(err).unwrap_err().into_failed().unwrap(), "nope");
    }

    #[test]
    fn test_promisify() {
        let add = promisify(|(a, b): (u32, u32), cb: Callback<u32, String>| cb.ok(a + b));
        assert_eq!(block_on(add((2, 3))).unwrap(), 5);
    }

    #[test]
    fn test_callbackify_success_and_failure() {
        let halve = callbackify(InlineSpawner, |n: u32| async move {
            if n % 2 == 0 {
                Ok(n / 2)
            } else {
                Err(format!("{n} is odd"))
            }
        });

        let ok = from_callback(|cb| halve(8, cb));
        assert_eq!(block_on(ok).unwrap(), 4);

        let err = from_callback(|cb| halve(3, cb));
        assert_eq!(block_on(err).unwrap_err().into_failed().unwrap(), "3 is odd");
    }

    #[test]
    fn test_callbackify_catches_sync_panic() {
        let boom = callbackify(InlineSpawner, |_: ()| -> futures::future::Ready<Result<(), ()>> {
            panic!("sync boom")
        });
        let outcome = block_on(from_callback(|cb| boom((), cb)));
        assert!(matches!(outcome, Err(TaskError::Panicked(msg)) if msg == "sync boom"));
    }

    #[test]
    fn test_callbackify_catches_async_panic() {
        let boom = callbackify(InlineSpawner, |_: ()| async {
            if true {
                panic!("async boom");
            }
            Ok::<(), ()>(())
        });
        let outcome = block_on(from_callback(|cb| boom((), cb)));
        assert!(matches!(outcome, Err(TaskError::Panicked(msg)) if msg == "async boom"));
    }

    #[test]
    fn test_resolver_first_settle_wins() {
        let Deferred { promise, resolver } = deferred::<u8, &str>();
        let other = resolver.clone();
        assert!(!resolver.is_settled());
        assert!(other.reject("first"));
        assert!(!resolver.resolve(1));
        assert!(resolver.is_settled());
        assert_eq!(block_on(promise).unwrap_err().into_failed(), Some("first"));
    }

    #[test]
    fn test_dropped_resolver_reports_lost() {
        let Deferred { promise, resolver } = deferred::<u8, ()>();
        drop(resolver);
        assert!(matches!(block_on(promise), Err(TaskError::Lost)));
    }
}
