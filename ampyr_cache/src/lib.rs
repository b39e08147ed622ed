//! Signature-keyed caching for REST API clients
//!
//! Expensive calls, such as token exchanges or remote lookups, are keyed by
//! a canonical [`CacheKey`] derived from the receiver's type, the method
//! name, and the call's arguments. The resulting value is brokered through
//! a [`CacheManager`], which may keep entries in memory, in a JSON file, in
//! a SQLite database, or nowhere at all.
//!
//! ```
//! # async fn run() -> Result<(), ampyr_cache::CacheError> {
//! use ampyr_cache::{CacheManager, InMemoryCache, KeyBuilder};
//!
//! let cache = InMemoryCache::new();
//! let key = KeyBuilder::new("Albums").method("list").arg("page", &1_u32).build();
//!
//! assert!(cache.find(&key).await.is_none());
//! cache.save(&key, vec![314, 4280, 1738]).await?;
//! assert_eq!(cache.find(&key).await, Some(vec![314, 4280, 1738]));
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! * `file`: Provides [`FileCache`], a JSON document per keyspace on the local
//!   filesystem.
//! * `store`: Provides [`SqliteCache`], a transactional store backed by SQLite.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use std::sync::Arc;

use async_trait::async_trait;

mod cached;
mod error;
#[cfg(feature = "file")]
mod file;
mod key;
mod memory;
mod null;
#[cfg(feature = "store")]
mod store;

pub use cached::{cached_call, HasCacheManager};
pub use error::CacheError;
#[cfg(feature = "file")]
pub use file::{cache_path, FileCache, DEFAULT_CACHE_PATH};
pub use key::{CacheKey, CacheKeyRef, KeyArg, KeyBuilder};
pub use memory::InMemoryCache;
pub use null::NullCache;
#[cfg(feature = "store")]
pub use store::SqliteCache;

/// Brokers cached values of type `T` by key
///
/// A `find` issued after a `save` to the same key on the same instance
/// observes the saved value unless another `save` to that key intervened.
/// Concurrent writers to one key race and the last write wins.
#[async_trait]
pub trait CacheManager<T>: Send + Sync
where
    T: Send + 'static,
{
    /// Looks up the value stored under `key`
    ///
    /// A miss is not an error. Backends that fail to read treat the
    /// failure as a miss.
    async fn find(&self, key: &CacheKeyRef) -> Option<T>;

    /// Stores `value` under `key`, replacing any existing entry, and
    /// returns the stored value
    async fn save(&self, key: &CacheKeyRef, value: T) -> Result<T, CacheError>;
}

#[async_trait]
impl<T, M> CacheManager<T> for Arc<M>
where
    T: Send + 'static,
    M: CacheManager<T> + ?Sized,
{
    #[inline]
    async fn find(&self, key: &CacheKeyRef) -> Option<T> {
        (**self).find(key).await
    }

    #[inline]
    async fn save(&self, key: &CacheKeyRef, value: T) -> Result<T, CacheError> {
        (**self).save(key, value).await
    }
}

#[async_trait]
impl<T, M> CacheManager<T> for Box<M>
where
    T: Send + 'static,
    M: CacheManager<T> + ?Sized,
{
    #[inline]
    async fn find(&self, key: &CacheKeyRef) -> Option<T> {
        (**self).find(key).await
    }

    #[inline]
    async fn save(&self, key: &CacheKeyRef, value: T) -> Result<T, CacheError> {
        (**self).save(key, value).await
    }
}
