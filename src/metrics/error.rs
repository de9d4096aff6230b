use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to open metrics store '{0}'")]
    Open(PathBuf, #[source] rusqlite::Error),

    #[error("SQLite operation failed")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Table 'stations' has columns {found:?}, expected {expected:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Station {station_id} reported availability but is missing from the station cache")]
    MissingCacheEntry { station_id: i64 },

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Unexpected aggregate data in column '{column}' at row {row}")]
    UnexpectedData { column: String, row: usize },
}
