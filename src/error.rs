use crate::feeds::error::FeedError;
use crate::metrics::error::MetricsError;
use crate::projection::error::ProjectionError;
use crate::stations::error::StationCacheError;
use crate::zones::error::ZoneError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VelostatError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    StationCache(#[from] StationCacheError),

    #[error(transparent)]
    Zone(#[from] ZoneError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("Failed to create directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine data directory")]
    DataDirResolution,
}

impl VelostatError {
    /// True when the run failed while reading one of the live feeds.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, VelostatError::Feed(_))
    }
}
