use async_trait::async_trait;

use crate::{CacheError, CacheKeyRef, CacheManager};

/// A cache that never holds anything
///
/// Used when caching is disabled: every lookup misses and every save is
/// accepted without being stored.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullCache;

#[async_trait]
impl<T: Send + 'static> CacheManager<T> for NullCache {
    #[inline]
    async fn find(&self, _: &CacheKeyRef) -> Option<T> {
        None
    }

    #[inline]
    async fn save(&self, _: &CacheKeyRef, value: T) -> Result<T, CacheError> {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_misses() {
        let key = CacheKeyRef::from_static("object_key");

        let saved = NullCache.save(key, 42_u32).await.unwrap();
        assert_eq!(saved, 42);
        assert_eq!(CacheManager::<u32>::find(&NullCache, key).await, None);
    }
}
