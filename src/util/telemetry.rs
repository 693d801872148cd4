//! Telemetry helpers for structured logging and tracing.
//!
//! Scheduler log lines carry a `run_id` field identifying the mapping call
//! they belong to, so a filter such as
//! `RUST_LOG=prometheus_async_map::core::scheduler=debug` traces every
//! dispatch and completion of every run.

/// Initialize tracing. Users can install their own subscriber; this helper
/// installs a default env-based subscriber if none is set.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Like [`init_tracing`], with an explicit filter directive such as
/// `"prometheus_async_map=debug"` instead of `RUST_LOG`.
pub fn init_tracing_with_filter(directive: &str) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(directive))
        .try_init();
}
