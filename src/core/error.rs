//! Error types for mapping operations.

use thiserror::Error;

/// Configuration errors produced while building engines or limits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    /// Concurrency limit was zero or negative.
    #[error("invalid concurrency limit: {0} (must be a positive integer or unbounded)")]
    InvalidLimit(i64),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Runtime adapter could not be constructed.
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Outcome of a single task that did not produce a value.
#[derive(Debug, Error)]
pub enum TaskError<E> {
    /// The worker reported an error.
    #[error("task failed: {0}")]
    Failed(E),
    /// The worker panicked; carries the panic message when it was a string.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The completion handle was dropped before it fired.
    #[error("task completion was dropped before it fired")]
    Lost,
}

impl<E> TaskError<E> {
    /// Return the worker's own error, if that is what this is.
    pub fn into_failed(self) -> Option<E> {
        match self {
            Self::Failed(e) => Some(e),
            Self::Panicked(_) | Self::Lost => None,
        }
    }

    /// Convert into the worker's error, re-raising panics and lost
    /// completions on the calling task.
    ///
    /// # Panics
    ///
    /// Panics when the task itself panicked or its completion was lost, so
    /// the failure surfaces on the task awaiting the aggregate result.
    pub fn into_inner(self) -> E {
        match self {
            Self::Failed(e) => e,
            Self::Panicked(msg) => std::panic::panic_any(msg),
            Self::Lost => std::panic::panic_any(String::from(
                "task completion was dropped before it fired",
            )),
        }
    }

}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
