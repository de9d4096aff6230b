use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Reading the response body from {0} failed")]
    DownloadIo(String, #[source] std::io::Error),

    #[error("Failed to read feed file '{0}'")]
    FileRead(PathBuf, #[source] std::io::Error),

    #[error("Feed {0} is not a valid station document")]
    Decode(String, #[source] serde_json::Error),

    #[error("Station record #{index} in feed {feed} is invalid")]
    InvalidStation {
        feed: String,
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
