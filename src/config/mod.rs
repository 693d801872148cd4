//! Configuration models for engines and runtimes.

pub mod engine;

pub use engine::{EngineConfig, RuntimeConfig, DEFAULT_LIMIT_VAR, WORKER_THREADS_VAR};
