//! # Prometheus Async Map
//!
//! Bounded-concurrency mapping over collections of asynchronous work.
//!
//! The heart of the crate is a windowed scheduler: it walks an ordered list
//! of items, keeps at most `limit` worker invocations outstanding, writes
//! each result into the slot of the item that produced it and stops
//! dispatching at the first failure. Everything else is layered on top.
//!
//! ## Key Features
//!
//! - **Order-preserving results**: output order equals input order no matter
//!   which task finishes first
//! - **Shape-preserving inputs**: vectors, arrays, hash maps, B-tree maps and
//!   drained iterators; maps come back keyed like the input
//! - **Fail-fast**: the first error is returned unwrapped, with no partial
//!   results
//! - **Derived combinators**: `for_each`, `filter`, `find`, `some`, `every`,
//!   `flat_map` and `all_settled`, each with `_limit` and `_series` flavors
//! - **Callback bridge**: convert between error-first callbacks and futures
//!
//! ## Example
//!
//! ```rust,ignore
//! use prometheus_async_map::core::{Engine, Limit};
//!
//! let engine = Engine::current();
//! let lengths = engine
//!     .map_limit(Limit::new(4)?, |url: String| async move { fetch_len(&url).await }, urls)
//!     .await?;
//! ```
//!
//! Engines can also be built from configuration:
//!
//! ```rust,ignore
//! use prometheus_async_map::builders::build_engine_from_env;
//!
//! let engine = build_engine_from_env()?;
//! let doubled = engine.map_default(|n: u64| async move { Ok::<_, MyError>(n * 2) }, vec![1, 2, 3]).await?;
//! ```

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core mapping abstractions, scheduler and combinators.
pub mod core;
/// Configuration models for engines and runtimes.
pub mod config;
/// Builders to construct engines from configuration.
#[cfg(feature = "tokio-runtime")]
pub mod builders;
/// Runtime adapters that drive worker futures.
#[cfg(feature = "tokio-runtime")]
pub mod runtime;
/// Shared utilities.
pub mod util;
