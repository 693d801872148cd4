//! Runtime adapters that drive worker futures.

pub mod tokio_spawner;

pub use tokio_spawner::TokioSpawner;
