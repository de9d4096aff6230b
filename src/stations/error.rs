use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StationCacheError {
    #[error("Failed to read station cache '{0}'")]
    CacheRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to write station cache '{0}'")]
    CacheWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode station cache '{0}'")]
    CacheDecode(PathBuf, #[source] serde_json::Error),

    #[error("Failed to encode station cache")]
    CacheEncode(#[source] serde_json::Error),

    #[error("Station cache '{path}' has format version {found}, expected {supported}")]
    UnsupportedVersion {
        path: PathBuf,
        found: u64,
        supported: u64,
    },
}
