use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Failed to encode output document '{0}'")]
    Encode(PathBuf, #[source] serde_json::Error),

    #[error("Failed to write output document '{0}'")]
    Write(PathBuf, #[source] std::io::Error),
}
