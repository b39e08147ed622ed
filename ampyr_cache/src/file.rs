//! A file-backed caching layer

use std::{
    io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::{CacheError, CacheKeyRef, CacheManager};

/// Root path used for cache files when none is configured
pub const DEFAULT_CACHE_PATH: &str = ".cache";

/// Resolves the path of a cache file
///
/// The root (or [`DEFAULT_CACHE_PATH`] when absent or empty) is joined with
/// every present, non-empty discriminating id using `-`, so
/// `cache_path(None, [Some("spotify"), None, Some("me")])` yields
/// `.cache-spotify-me`.
pub fn cache_path<'a, I>(root: Option<&Path>, ids: I) -> PathBuf
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let root = match root {
        Some(root) if !root.as_os_str().is_empty() => root,
        _ => Path::new(DEFAULT_CACHE_PATH),
    };

    let mut name = root.as_os_str().to_owned();
    for id in ids.into_iter().flatten().filter(|id| !id.is_empty()) {
        name.push("-");
        name.push(id);
    }

    PathBuf::from(name)
}

/// A cache that keeps one keyspace in a single JSON document on disk
///
/// Every entry is stored under its key in a top-level JSON object. Writes
/// replace the whole document atomically through a temporary sibling file.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCache {
    /// Constructs a file cache stored at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Constructs a file cache at [`cache_path`]`(root, ids)`
    pub fn with_ids<'a, I>(root: Option<&Path>, ids: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        Self::new(cache_path(root, ids))
    }

    /// The file backing this cache
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<Map<String, Value>, CacheError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(error) => return Err(CacheError::io(&self.path, error)),
        };

        Ok(serde_json::from_slice(&data)?)
    }

    async fn write_entries(&self, entries: &Map<String, Value>) -> Result<(), CacheError> {
        let data = serde_json::to_vec_pretty(entries)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, &data)).await?
    }
}

/// Writes `data` to a uniquely named sibling of `path` and renames it into
/// place, so concurrent writers never share a temporary file
fn write_atomically(path: &Path, data: &[u8]) -> Result<(), CacheError> {
    use std::io::Write;

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // Created with mode 0600 on unix
    let mut file =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| CacheError::io(parent, e))?;
    file.write_all(data)
        .map_err(|e| CacheError::io(file.path(), e))?;
    file.as_file()
        .sync_all()
        .map_err(|e| CacheError::io(file.path(), e))?;

    file.persist(path).map_err(|e| CacheError::io(path, e.error))?;
    Ok(())
}

#[async_trait]
impl<T> CacheManager<T> for FileCache
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn find(&self, key: &CacheKeyRef) -> Option<T> {
        let mut entries = match self.read_entries().await {
            Ok(entries) => entries,
            Err(error) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = (&error as &dyn std::error::Error),
                    "unable to read cache file, treating as miss"
                );
                return None;
            }
        };

        let value = entries.remove(key.as_str())?;
        match serde_json::from_value(value) {
            Ok(found) => {
                tracing::trace!(%key, path = %self.path.display(), "file cache hit");
                Some(found)
            }
            Err(error) => {
                tracing::warn!(
                    %key,
                    error = (&error as &dyn std::error::Error),
                    "cached entry has unexpected shape, treating as miss"
                );
                None
            }
        }
    }

    async fn save(&self, key: &CacheKeyRef, value: T) -> Result<T, CacheError> {
        let _guard = self.write_lock.lock().await;

        let mut entries = match self.read_entries().await {
            Ok(entries) => entries,
            Err(error @ CacheError::Serialize(_)) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = (&error as &dyn std::error::Error),
                    "discarding unreadable cache file"
                );
                Map::new()
            }
            Err(error) => return Err(error),
        };

        entries.insert(key.as_str().to_owned(), serde_json::to_value(&value)?);
        self.write_entries(&entries).await?;

        tracing::trace!(%key, path = %self.path.display(), "saved value to file cache");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_path_joins_present_ids() {
        assert_eq!(
            cache_path(None, Vec::<Option<&str>>::new()),
            PathBuf::from(".cache")
        );
        assert_eq!(
            cache_path(None, [Some("spotify"), None, Some("me")]),
            PathBuf::from(".cache-spotify-me")
        );
        assert_eq!(
            cache_path(Some(Path::new("/tmp/tokens")), [Some(""), Some("app")]),
            PathBuf::from("/tmp/tokens-app")
        );
        assert_eq!(
            cache_path(Some(Path::new("")), [Some("x")]),
            PathBuf::from(".cache-x")
        );
    }

    #[tokio::test]
    async fn brokers_saved_values() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("cache.json"));
        let obj_key = CacheKeyRef::from_static("object_key");
        let nil_key = CacheKeyRef::from_static("null_key");

        cache.save(obj_key, vec![314, 4280, 1738]).await.unwrap();

        assert_eq!(CacheManager::<Vec<i32>>::find(&cache, nil_key).await, None);
        assert_eq!(cache.find(obj_key).await, Some(vec![314, 4280, 1738]));
    }

    #[tokio::test]
    async fn entries_survive_new_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.json");
        let key = CacheKeyRef::from_static("<Client=get>");

        FileCache::new(&path)
            .save(key, "value".to_owned())
            .await
            .unwrap();

        let reopened = FileCache::new(&path);
        assert_eq!(
            CacheManager::<String>::find(&reopened, key).await.as_deref(),
            Some("value")
        );
    }

    #[tokio::test]
    async fn keys_share_one_document() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("cache.json"));
        let a = CacheKeyRef::from_static("a");
        let b = CacheKeyRef::from_static("b");

        cache.save(a, 1_u8).await.unwrap();
        cache.save(b, 2_u8).await.unwrap();
        cache.save(a, 3_u8).await.unwrap();

        assert_eq!(cache.find(a).await, Some(3_u8));
        assert_eq!(cache.find(b).await, Some(2_u8));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_on_one_file_never_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.json");
        let caches = [
            std::sync::Arc::new(FileCache::new(&path)),
            std::sync::Arc::new(FileCache::new(&path)),
        ];

        let tasks: Vec<_> = (0..100_u32)
            .map(|i| {
                let cache = caches[i as usize % 2].clone();
                tokio::spawn(async move {
                    let key = crate::CacheKey::new(format!("key-{}", i % 4));
                    cache.save(&key, i).await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let entries: Map<String, Value> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(!entries.is_empty());
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_miss_and_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();
        let cache = FileCache::new(&path);
        let key = CacheKeyRef::from_static("k");

        assert_eq!(CacheManager::<u8>::find(&cache, key).await, None);

        cache.save(key, 9_u8).await.unwrap();
        assert_eq!(cache.find(key).await, Some(9_u8));
    }

    #[tokio::test]
    async fn write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("missing").join("cache.json"));
        let key = CacheKeyRef::from_static("k");

        let err = cache.save(key, 1_u8).await.unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
        assert_eq!(CacheManager::<u8>::find(&cache, key).await, None);
    }
}
