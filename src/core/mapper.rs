//! Struct-based item workers.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

/// Abstraction for mapping one item to a result.
///
/// Closures are the common case; implement this when the worker carries its
/// own state (clients, caches, counters) and reads better as a type.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_async_map::core::{from_mapper, ItemMapper, Limit};
///
/// struct Fetcher {
///     base: String,
/// }
///
/// #[async_trait]
/// impl ItemMapper<u32, String, std::io::Error> for Fetcher {
///     async fn call(&self, id: u32) -> Result<String, std::io::Error> {
///         Ok(format!("{}/{id}", self.base))
///     }
/// }
///
/// let urls = engine
///     .map_limit(Limit::new(4)?, from_mapper(Fetcher { base: "api".into() }), vec![1, 2, 3])
///     .await?;
/// ```
#[async_trait]
pub trait ItemMapper<T, R, E>: Send + Sync + 'static
where
    T: Send + 'static,
{
    /// Map a single item.
    async fn call(&self, item: T) -> Result<R, E>;
}

/// Adapt an [`ItemMapper`] into the closure form the engine accepts.
pub fn from_mapper<T, R, E, M>(
    mapper: M,
) -> impl Fn(T) -> BoxFuture<'static, Result<R, E>> + Send + Sync + 'static
where
    M: ItemMapper<T, R, E>,
    T: Send + 'static,
    R: Send + 'static,
    E: Send + 'static,
{
    let mapper = Arc::new(mapper);
    move |item| {
        let mapper = Arc::clone(&mapper);
        async move { mapper.call(item).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scale {
        factor: u32,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ItemMapper<u32, u32, String> for Scale {
        async fn call(&self, item: u32) -> Result<u32, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            item.checked_mul(self.factor)
                .ok_or_else(|| format!("{item} overflows"))
        }
    }

    #[test]
    fn test_from_mapper_calls_through() {
        let f = from_mapper(Scale {
            factor: 3,
            calls: AtomicUsize::new(0),
        });
        assert_eq!(futures::executor::block_on(f(4)), Ok(12));
        assert!(futures::executor::block_on(f(u32::MAX)).is_err());
    }
}
