//! Concurrency limits.

use std::fmt;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::core::MapError;

/// Maximum number of worker invocations allowed to be outstanding at once.
///
/// Serializes as a positive integer or the string `"unbounded"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "LimitRepr", into = "LimitRepr")]
pub enum Limit {
    /// At most this many tasks in flight.
    Bounded(NonZeroUsize),
    /// Dispatch everything immediately.
    #[default]
    Unbounded,
}

impl Limit {
    /// One task at a time.
    pub const SERIAL: Self = Self::Bounded(NonZeroUsize::MIN);

    /// Build a bounded limit, rejecting zero.
    ///
    /// # Errors
    ///
    /// Returns [`MapError::InvalidLimit`] when `n` is zero.
    pub fn new(n: usize) -> Result<Self, MapError> {
        NonZeroUsize::new(n)
            .map(Self::Bounded)
            .ok_or(MapError::InvalidLimit(0))
    }

    /// A limit equal to the number of logical CPUs.
    #[must_use]
    pub fn available_parallelism() -> Self {
        NonZeroUsize::new(num_cpus::get()).map_or(Self::SERIAL, Self::Bounded)
    }

    /// Whether `in_flight` more tasks can be started under this limit.
    #[must_use]
    pub const fn allows(self, in_flight: usize) -> bool {
        match self.get() {
            Some(n) => in_flight < n,
            None => true,
        }
    }

    /// The bound, if any.
    #[must_use]
    pub const fn get(self) -> Option<usize> {
        match self {
            Self::Bounded(n) => Some(n.get()),
            Self::Unbounded => None,
        }
    }
}

impl From<NonZeroUsize> for Limit {
    fn from(n: NonZeroUsize) -> Self {
        Self::Bounded(n)
    }
}

impl TryFrom<usize> for Limit {
    type Error = MapError;

    fn try_from(n: usize) -> Result<Self, Self::Error> {
        Self::new(n)
    }
}

impl TryFrom<i64> for Limit {
    type Error = MapError;

    fn try_from(n: i64) -> Result<Self, Self::Error> {
        usize::try_from(n)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(Self::Bounded)
            .ok_or(MapError::InvalidLimit(n))
    }
}

impl std::str::FromStr for Limit {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unbounded") || s.eq_ignore_ascii_case("infinity") {
            return Ok(Self::Unbounded);
        }
        let n: i64 = s
            .parse()
            .map_err(|e| MapError::InvalidConfig(format!("limit `{s}`: {e}")))?;
        Self::try_from(n)
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(n) => write!(f, "{n}"),
            Self::Unbounded => f.write_str("unbounded"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum LimitRepr {
    Count(i64),
    Named(String),
}

impl TryFrom<LimitRepr> for Limit {
    type Error = MapError;

    fn try_from(repr: LimitRepr) -> Result<Self, Self::Error> {
        match repr {
            LimitRepr::Count(n) => Self::try_from(n),
            LimitRepr::Named(s) => s.parse(),
        }
    }
}

impl From<Limit> for LimitRepr {
    fn from(limit: Limit) -> Self {
        match limit {
            Limit::Bounded(n) => Self::Count(i64::try_from(n.get()).unwrap_or(i64::MAX)),
            Limit::Unbounded => Self::Named("unbounded".into()),
        }
    }
}
