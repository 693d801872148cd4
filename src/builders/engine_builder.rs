//! Builders to construct engines from configuration.

use anyhow::Context;
use tracing::info;

use crate::config::{EngineConfig, RuntimeConfig};
use crate::core::{AppResult, Engine, MapError};
use crate::runtime::TokioSpawner;

/// Build an engine from configuration.
///
/// [`RuntimeConfig::Current`] borrows the tokio runtime the caller is running
/// in; [`RuntimeConfig::Dedicated`] starts a new one owned by the engine.
///
/// # Errors
///
/// Returns [`MapError::InvalidConfig`] when the configuration fails
/// validation and [`MapError::Runtime`] when no runtime is available or one
/// cannot be started.
pub fn build_engine(cfg: &EngineConfig) -> Result<Engine<TokioSpawner>, MapError> {
    cfg.validate()
        .map_err(|e| MapError::InvalidConfig(format!("config invalid: {e}")))?;

    let spawner = match cfg.runtime {
        RuntimeConfig::Current => TokioSpawner::try_current()?,
        RuntimeConfig::Dedicated { worker_threads } => TokioSpawner::with_worker_threads(worker_threads)?,
    };

    info!(
        default_limit = %cfg.default_limit,
        dedicated = spawner.is_dedicated(),
        "engine built"
    );
    Ok(Engine::new(spawner).with_default_limit(cfg.default_limit))
}

/// Load configuration from the environment and build an engine from it.
///
/// # Errors
///
/// Fails when an environment variable is invalid or the engine cannot be
/// built; the error carries which step failed.
pub fn build_engine_from_env() -> AppResult<Engine<TokioSpawner>> {
    let cfg = EngineConfig::from_env().context("loading engine configuration from environment")?;
    let engine = build_engine(&cfg).context("building engine")?;
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Limit;

    #[test]
    fn test_current_requires_runtime() {
        let err = build_engine(&EngineConfig::default()).unwrap_err();
        assert!(matches!(err, MapError::Runtime(_)));
    }

    #[tokio::test]
    async fn test_build_on_current_runtime() {
        let cfg = EngineConfig {
            default_limit: Limit::new(3).unwrap(),
            runtime: RuntimeConfig::Current,
        };
        let engine = build_engine(&cfg).unwrap();
        assert_eq!(engine.default_limit(), Limit::new(3).unwrap());
        assert!(!engine.spawner().is_dedicated());
    }

    #[test]
    fn test_build_dedicated() {
        let cfg = EngineConfig {
            default_limit: Limit::SERIAL,
            runtime: RuntimeConfig::Dedicated { worker_threads: 2 },
        };
        let engine = build_engine(&cfg).unwrap();
        assert!(engine.spawner().is_dedicated());
        let out = futures::executor::block_on(
            engine.map_default(|n: u32| async move { Ok::<_, ()>(n + 1) }, vec![1, 2, 3]),
        );
        assert_eq!(out, Ok(vec![2, 3, 4]));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = EngineConfig {
            default_limit: Limit::Unbounded,
            runtime: RuntimeConfig::Dedicated { worker_threads: 0 },
        };
        assert!(matches!(build_engine(&cfg), Err(MapError::InvalidConfig(_))));
    }
}
