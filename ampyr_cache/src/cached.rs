//! Memoization of method calls through a [`CacheManager`]

use std::future::Future;

use crate::{CacheError, CacheKeyRef, CacheManager};

/// A type that exposes a cache manager for its cached methods
pub trait HasCacheManager<T: Send + 'static> {
    /// The cache manager used by this type's cached methods
    fn cache_manager(&self) -> &dyn CacheManager<T>;
}

/// Returns the value cached under `key`, or computes, saves, and returns it
///
/// `compute` runs exactly once on a miss and not at all on a hit. If
/// `compute` fails, its error is returned and nothing is cached. A failure
/// to save is returned through `E`.
pub async fn cached_call<M, T, E, F, Fut>(
    manager: &M,
    key: &CacheKeyRef,
    compute: F,
) -> Result<T, E>
where
    M: CacheManager<T> + ?Sized,
    T: Send + 'static,
    E: From<CacheError>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if let Some(found) = manager.find(key).await {
        tracing::trace!(%key, "cached call hit");
        return Ok(found);
    }

    tracing::debug!(%key, "cached call miss, computing");
    let value = compute().await?;
    Ok(manager.save(key, value).await?)
}

/// Wraps a method body so its result is cached under a key built from the
/// receiver's type, the method name, and the named arguments
///
/// The receiver must implement [`HasCacheManager`]. The error type of the
/// body must implement `From<CacheError>`.
///
/// ```
/// use ampyr_cache::{cached, CacheError, CacheManager, HasCacheManager, InMemoryCache};
///
/// struct Albums {
///     cache: InMemoryCache<Vec<String>>,
/// }
///
/// impl HasCacheManager<Vec<String>> for Albums {
///     fn cache_manager(&self) -> &dyn CacheManager<Vec<String>> {
///         &self.cache
///     }
/// }
///
/// impl Albums {
///     async fn tracks(&self, album: &str, limit: usize) -> Result<Vec<String>, CacheError> {
///         cached!(self, tracks(album, limit) => async {
///             Ok(vec![format!("{album}: track 1")])
///         })
///         .await
///     }
/// }
/// ```
#[macro_export]
macro_rules! cached {
    ($receiver:expr, $method:ident ( $($arg:ident),* $(,)? ) => $body:expr) => {{
        let receiver = $receiver;
        let key = $crate::KeyBuilder::for_receiver(receiver)
            .method(::std::stringify!($method))
            $(.arg(::std::stringify!($arg), &$arg))*
            .build();
        async move {
            $crate::cached_call(
                $crate::HasCacheManager::cache_manager(receiver),
                &key,
                || $body,
            )
            .await
        }
    }};
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use thiserror::Error;

    use crate::{InMemoryCache, KeyBuilder};

    use super::*;

    #[derive(Debug, Error)]
    enum LookupError {
        #[error("remote lookup failed")]
        Remote,
        #[error(transparent)]
        Cache(#[from] CacheError),
    }

    struct Catalog {
        cache: InMemoryCache<Vec<u32>>,
        calls: AtomicUsize,
        #[allow(dead_code)]
        label: &'static str,
    }

    impl Catalog {
        fn new(label: &'static str) -> Self {
            Self {
                cache: InMemoryCache::new(),
                calls: AtomicUsize::new(0),
                label,
            }
        }

        async fn lookup(&self, artist: &str, page: u32) -> Result<Vec<u32>, LookupError> {
            cached!(self, lookup(artist, page) => async {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![page, artist.len() as u32])
            })
            .await
        }

        async fn everything(&self) -> Result<Vec<u32>, LookupError> {
            cached!(self, everything() => async {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![1, 2, 3])
            })
            .await
        }

        async fn failing(&self, attempt: u32) -> Result<Vec<u32>, LookupError> {
            cached!(self, failing(attempt) => async {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Err(LookupError::Remote)
            })
            .await
        }
    }

    impl HasCacheManager<Vec<u32>> for Catalog {
        fn cache_manager(&self) -> &dyn CacheManager<Vec<u32>> {
            &self.cache
        }
    }

    #[tokio::test]
    async fn identical_arguments_compute_once() {
        let catalog = Catalog::new("a");

        let first = catalog.lookup("abba", 1).await.unwrap();
        let second = catalog.lookup("abba", 1).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn differing_arguments_compute_each_time() {
        let catalog = Catalog::new("a");

        catalog.lookup("abba", 1).await.unwrap();
        catalog.lookup("abba", 2).await.unwrap();

        assert_eq!(catalog.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_argument_methods_are_cached() {
        let catalog = Catalog::new("a");

        catalog.everything().await.unwrap();
        catalog.everything().await.unwrap();

        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let catalog = Catalog::new("a");

        assert!(matches!(catalog.failing(1).await, Err(LookupError::Remote)));
        assert!(matches!(catalog.failing(1).await, Err(LookupError::Remote)));

        assert_eq!(catalog.calls.load(Ordering::SeqCst), 2);
        assert!(catalog.cache.is_empty());
    }

    #[tokio::test]
    async fn key_ignores_receiver_state() {
        let shared = InMemoryCache::new();
        let first = Catalog::new("first");
        let second = Catalog::new("second");

        let key = |c: &Catalog| {
            KeyBuilder::for_receiver(c)
                .method("lookup")
                .arg("artist", "abba")
                .arg("page", &1_u32)
                .build()
        };
        assert_eq!(key(&first), key(&second));

        let computed: Result<_, CacheError> =
            cached_call(&shared, &key(&first), || async { Ok(vec![9]) }).await;
        let reused: Result<_, CacheError> =
            cached_call(&shared, &key(&second), || async { Ok(vec![0]) }).await;

        assert_eq!(computed.unwrap(), vec![9]);
        assert_eq!(reused.unwrap(), vec![9]);
    }

    struct BrokenCache;

    #[async_trait::async_trait]
    impl CacheManager<u8> for BrokenCache {
        async fn find(&self, _: &CacheKeyRef) -> Option<u8> {
            None
        }

        async fn save(&self, _: &CacheKeyRef, _: u8) -> Result<u8, CacheError> {
            Err(CacheError::Poisoned)
        }
    }

    #[tokio::test]
    async fn save_failure_is_returned() {
        let key = CacheKeyRef::from_static("k");
        let result: Result<u8, CacheError> =
            cached_call(&BrokenCache, key, || async { Ok(1) }).await;

        assert!(matches!(result, Err(CacheError::Poisoned)));
    }
}
