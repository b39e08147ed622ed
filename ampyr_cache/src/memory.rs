//! An in-memory caching layer

use std::{collections::HashMap, fmt, sync::RwLock};

use async_trait::async_trait;

use crate::{CacheError, CacheKey, CacheKeyRef, CacheManager};

/// An in-memory cache, cleared when the process exits
pub struct InMemoryCache<T> {
    entries: RwLock<HashMap<CacheKey, T>>,
}

impl<T> InMemoryCache<T> {
    /// Constructs a new, empty in-memory cache
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The number of entries held
    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |e| e.len())
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for InMemoryCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for InMemoryCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("InMemoryCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[async_trait]
impl<T> CacheManager<T> for InMemoryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn find(&self, key: &CacheKeyRef) -> Option<T> {
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(_) => {
                tracing::warn!(%key, "in-memory cache lock poisoned, treating as miss");
                return None;
            }
        };

        let found = entries.get(key).cloned();
        tracing::trace!(%key, hit = found.is_some(), "in-memory cache lookup");
        found
    }

    async fn save(&self, key: &CacheKeyRef, value: T) -> Result<T, CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.insert(key.to_owned(), value.clone());
        tracing::trace!(%key, "saved value to in-memory cache");
        Ok(value)
    }
}
