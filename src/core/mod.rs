//! Core mapping abstractions: limits, the scheduler, the callback/future
//! bridge and the engine with its combinators.

pub mod bridge;
pub mod combinators;
pub mod engine;
pub mod error;
pub mod limit;
pub mod mapper;
pub mod normalize;
pub mod scheduler;
pub mod spawn;

pub use bridge::{
    callbackify, deferred, from_callback, promisify, Callback, Deferred, Outcome, Promise, Resolver,
};
pub use combinators::Settled;
pub use engine::Engine;
pub use error::{AppResult, MapError, TaskError};
pub use limit::Limit;
pub use mapper::{from_mapper, ItemMapper};
pub use normalize::{Drain, IntoIndexed, Shape};
pub use scheduler::schedule;
pub use spawn::Spawn;
