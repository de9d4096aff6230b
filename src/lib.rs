mod config;
mod error;
mod feeds;
mod metrics;
mod projection;
mod stations;
mod types;
mod utils;
mod velostat;
mod zones;

pub use config::PipelineConfig;
pub use error::VelostatError;
pub use velostat::*;

pub use feeds::error::FeedError;
pub use feeds::feed_loader::{FeedLoader, FeedSource, DEFAULT_INFORMATION_URL, DEFAULT_STATUS_URL};

pub use stations::error::StationCacheError;
pub use stations::station_cache::{StationCache, CACHE_FORMAT_VERSION};

pub use zones::error::ZoneError;
pub use zones::zone_layer::{ZoneLayer, ZoneMatch};
pub use zones::zone_resolver::ZoneResolver;

pub use metrics::aggregates::{aggregate_rows, AggregateKey, AggregateRow};
pub use metrics::error::MetricsError;
pub use metrics::metrics_store::{samples_for_run, MetricsStore, TABLE_COLUMNS};

pub use projection::error::ProjectionError;
pub use projection::projector::{
    station_features, write_collection, EmptyEntityPolicy, Projector, VALUES_PROPERTY,
};

pub use types::grid::{AggregateGrid, CellAverage, GridSpec};
pub use types::run::{BatchRun, MetricSample};
pub use types::station::{EnrichedStation, FeedData, FeedDocument, StationInformation, StationStatus};
pub use types::zone::{coerce_zone_id, ZoneIds, ZoneLayerKind};

pub use utils::get_data_dir;
