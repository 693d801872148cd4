//! Engine and runtime configuration structures.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::{Limit, MapError};

/// Environment variable holding the default limit (`"unbounded"` or a
/// positive integer).
pub const DEFAULT_LIMIT_VAR: &str = "ASYNC_MAP_DEFAULT_LIMIT";
/// Environment variable selecting a dedicated runtime with this many worker
/// threads.
pub const WORKER_THREADS_VAR: &str = "ASYNC_MAP_WORKER_THREADS";

fn default_worker_threads() -> usize {
    num_cpus::get()
}

/// Describe a `.env` load failure worth reporting. A missing file is not one.
fn dotenv_problem<T>(result: Result<T, dotenvy::Error>) -> Option<String> {
    match result {
        Err(e) if !e.not_found() => Some(e.to_string()),
        _ => None,
    }
}

/// Where worker futures run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuntimeConfig {
    /// Spawn onto the tokio runtime the engine is built in.
    #[default]
    Current,
    /// Spawn onto a runtime owned by the engine.
    Dedicated {
        /// Worker thread count; defaults to the number of logical CPUs.
        #[serde(default = "default_worker_threads")]
        worker_threads: usize,
    },
}

/// Root engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Limit used by the `*_default` combinators.
    #[serde(default)]
    pub default_limit: Limit,
    /// Runtime adapter selection.
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl RuntimeConfig {
    /// Validate runtime configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Dedicated { worker_threads: 0 } => {
                Err("worker_threads must be greater than 0".into())
            }
            Self::Current | Self::Dedicated { .. } => Ok(()),
        }
    }
}

impl EngineConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid value.
    pub fn validate(&self) -> Result<(), String> {
        self.runtime
            .validate()
            .map_err(|e| format!("runtime invalid: {e}"))
    }

    /// Parse engine configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidConfig`] on malformed JSON, a zero limit or
    /// an invalid runtime section.
    pub fn from_json_str(input: &str) -> Result<Self, MapError> {
        let cfg: Self = serde_json::from_str(input)
            .map_err(|e| MapError::InvalidConfig(format!("parse error: {e}")))?;
        cfg.validate().map_err(MapError::InvalidConfig)?;
        Ok(cfg)
    }

    /// Load configuration from the process environment, reading a `.env`
    /// file first when one exists.
    ///
    /// Unset variables keep their defaults: an unbounded limit on the current
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidConfig`] when a variable is set but invalid.
    pub fn from_env() -> Result<Self, MapError> {
        if let Some(problem) = dotenv_problem(dotenvy::dotenv()) {
            warn!(%problem, "skipping unreadable .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidConfig`] when a variable is set but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MapError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(raw) = lookup(DEFAULT_LIMIT_VAR) {
            cfg.default_limit = raw
                .parse()
                .map_err(|e| MapError::InvalidConfig(format!("{DEFAULT_LIMIT_VAR}: {e}")))?;
        }

        if let Some(raw) = lookup(WORKER_THREADS_VAR) {
            let worker_threads = raw.trim().parse().map_err(|e| {
                MapError::InvalidConfig(format!("{WORKER_THREADS_VAR} `{raw}`: {e}"))
            })?;
            cfg.runtime = RuntimeConfig::Dedicated { worker_threads };
        }

        cfg.validate().map_err(MapError::InvalidConfig)?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_dotenv_problems() {
        assert_eq!(dotenv_problem(dotenvy::from_path("/nonexistent/async-map/.env")), None);

        let path = std::env::temp_dir().join(format!("async-map-{}.env", uuid::Uuid::new_v4()));
        std::fs::write(&path, "NOT A VALID LINE\n").unwrap();
        let problem = dotenv_problem(dotenvy::from_path(&path));
        std::fs::remove_file(&path).unwrap();
        assert!(problem.is_some());
    }

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg.default_limit, Limit::Unbounded);
        assert_eq!(cfg.runtime, RuntimeConfig::Current);
    }

    #[test]
    fn test_parse_dedicated() {
        let cfg = EngineConfig::from_json_str(
            r#"{"default_limit": 4, "runtime": {"kind": "dedicated", "worker_threads": 2}}"#,
        )
        .unwrap();
        assert_eq!(cfg.default_limit, Limit::new(4).unwrap());
        assert_eq!(cfg.runtime, RuntimeConfig::Dedicated { worker_threads: 2 });
    }

    #[test]
    fn test_dedicated_threads_default_to_cpus() {
        let cfg = EngineConfig::from_json_str(r#"{"runtime": {"kind": "dedicated"}}"#).unwrap();
        assert_eq!(
            cfg.runtime,
            RuntimeConfig::Dedicated {
                worker_threads: num_cpus::get()
            }
        );
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"default_limit": 0}"#),
            Err(MapError::InvalidConfig(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"runtime": {"kind": "dedicated", "worker_threads": 0}}"#),
            Err(MapError::InvalidConfig(_))
        ));
        assert!(EngineConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_from_lookup() {
        let cfg = EngineConfig::from_lookup(vars(&[
            (DEFAULT_LIMIT_VAR, "8"),
            (WORKER_THREADS_VAR, "3"),
        ]))
        .unwrap();
        assert_eq!(cfg.default_limit, Limit::new(8).unwrap());
        assert_eq!(cfg.runtime, RuntimeConfig::Dedicated { worker_threads: 3 });

        let cfg = EngineConfig::from_lookup(vars(&[(DEFAULT_LIMIT_VAR, "unbounded")])).unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        assert!(EngineConfig::from_lookup(vars(&[(DEFAULT_LIMIT_VAR, "0")])).is_err());
        assert!(EngineConfig::from_lookup(vars(&[(WORKER_THREADS_VAR, "lots")])).is_err());
        assert!(EngineConfig::from_lookup(vars(&[(WORKER_THREADS_VAR, "0")])).is_err());
    }
}
