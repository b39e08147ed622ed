use std::path::PathBuf;

use thiserror::Error;

/// An error persisting a value into a cache backend
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading or writing the backing file failed
    #[error("cache file I/O failed at {}", path.display())]
    Io {
        /// The file being accessed
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// The value could not be converted to or from its stored form
    #[error("unable to serialize cached value")]
    Serialize(#[from] serde_json::Error),
    /// The SQLite store rejected the operation
    #[cfg(feature = "store")]
    #[error("cache store operation failed")]
    Store(#[from] rusqlite::Error),
    /// The blocking task driving the backend failed to complete
    #[error("cache task did not complete")]
    Task(#[from] tokio::task::JoinError),
    /// A lock guarding the backend was poisoned by a panicking writer
    #[error("cache lock poisoned")]
    Poisoned,
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
