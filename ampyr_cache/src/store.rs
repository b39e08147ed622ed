//! A SQLite-backed caching layer

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};

use crate::{CacheError, CacheKey, CacheKeyRef, CacheManager};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
)";

/// A durable cache stored in a SQLite database
///
/// Each entry is one row keyed by its cache key, with the value stored as
/// JSON text. Saves run inside a transaction. The blocking driver runs on
/// the blocking thread pool.
#[derive(Clone, Debug)]
pub struct SqliteCache {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCache {
    /// Opens (creating when needed) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens a private, non-durable database
    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, CacheError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<R, F>(&self, op: F) -> Result<R, CacheError>
    where
        R: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<R, CacheError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| CacheError::Poisoned)?;
            op(&mut conn)
        })
        .await?
    }
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

#[async_trait]
impl<T> CacheManager<T> for SqliteCache
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn find(&self, key: &CacheKeyRef) -> Option<T> {
        let owned: CacheKey = key.to_owned();
        let lookup = self
            .with_conn(move |conn| {
                let value: Option<String> = conn
                    .query_row(
                        "SELECT value FROM cache_entries WHERE key = ?1",
                        params![owned.as_str()],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await;

        let raw = match lookup {
            Ok(raw) => raw?,
            Err(error) => {
                tracing::warn!(
                    %key,
                    error = (&error as &dyn std::error::Error),
                    "cache store lookup failed, treating as miss"
                );
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(found) => {
                tracing::trace!(%key, "cache store hit");
                Some(found)
            }
            Err(error) => {
                tracing::warn!(
                    %key,
                    error = (&error as &dyn std::error::Error),
                    "stored entry has unexpected shape, treating as miss"
                );
                None
            }
        }
    }

    async fn save(&self, key: &CacheKeyRef, value: T) -> Result<T, CacheError> {
        let owned: CacheKey = key.to_owned();
        let data = serde_json::to_string(&value)?;

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO cache_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE
                 SET value = excluded.value, updated_at = excluded.updated_at",
                params![owned.as_str(), data, unix_now()],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await?;

        tracing::trace!(%key, "saved value to cache store");
        Ok(value)
    }
}
