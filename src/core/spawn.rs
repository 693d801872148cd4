//! Runtime seam for driving worker futures in the background.

use std::future::Future;
use std::sync::Arc;

/// Abstraction for spawning task execution on a runtime.
pub trait Spawn {
    /// Spawn a detached future that runs to completion on its own.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

impl<S: Spawn + ?Sized> Spawn for Arc<S> {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        (**self).spawn(fut);
    }
}

impl<S: Spawn + ?Sized> Spawn for &S {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        (**self).spawn(fut);
    }
}
