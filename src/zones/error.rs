use crate::types::zone::ZoneLayerKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZoneError {
    #[error("Failed to read {kind} reference layer '{path}'")]
    ReferenceRead {
        kind: ZoneLayerKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{kind} reference layer '{path}' is not valid UTF-8")]
    ReferenceEncoding {
        kind: ZoneLayerKind,
        path: PathBuf,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("Failed to parse {kind} reference layer '{path}'")]
    ReferenceParse {
        kind: ZoneLayerKind,
        path: PathBuf,
        #[source]
        source: geojson::Error,
    },

    #[error("{kind} reference layer '{path}' is not a FeatureCollection")]
    NotFeatureCollection { kind: ZoneLayerKind, path: PathBuf },

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
