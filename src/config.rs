//! Run configuration. Every location is derived from a single data directory
//! unless overridden.

use crate::feeds::feed_loader::{FeedSource, DEFAULT_INFORMATION_URL, DEFAULT_STATUS_URL};
use crate::types::grid::GridSpec;
use crate::types::zone::ZoneLayerKind;
use bon::Builder;
use std::path::{Path, PathBuf};

const CACHE_FILE_NAME: &str = "stations.json";
const DATABASE_FILE_NAME: &str = "data.db";
const OUTPUT_DIR_NAME: &str = "output";
const STATION_OUTPUT_FILE_NAME: &str = "stations.geojson";

/// # Examples
///
/// ```
/// use velostat::{FeedSource, PipelineConfig, ZoneLayerKind};
///
/// let config = PipelineConfig::builder()
///     .data_dir("/srv/velostat")
///     .status_feed(FeedSource::from("/srv/feeds/status.json"))
///     .build();
///
/// assert_eq!(config.output_dir().to_str(), Some("/srv/velostat/output"));
/// assert_eq!(config.zone_id_property(ZoneLayerKind::Commune), "insee");
/// ```
#[derive(Debug, Clone, Builder)]
pub struct PipelineConfig {
    #[builder(into)]
    data_dir: PathBuf,
    #[builder(into)]
    output_dir: Option<PathBuf>,
    #[builder(default = FeedSource::Http(DEFAULT_STATUS_URL.to_string()))]
    status_feed: FeedSource,
    #[builder(default = FeedSource::Http(DEFAULT_INFORMATION_URL.to_string()))]
    information_feed: FeedSource,
    #[builder(into)]
    neighbourhood_id_property: Option<String>,
    #[builder(into)]
    arrondissement_id_property: Option<String>,
    #[builder(into)]
    commune_id_property: Option<String>,
    #[builder(default)]
    grid: GridSpec,
}

impl PipelineConfig {
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join(OUTPUT_DIR_NAME))
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(CACHE_FILE_NAME)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE_NAME)
    }

    pub fn status_feed(&self) -> &FeedSource {
        &self.status_feed
    }

    pub fn information_feed(&self) -> &FeedSource {
        &self.information_feed
    }

    pub fn grid(&self) -> GridSpec {
        self.grid
    }

    /// Reference boundary file for a layer. A `.gz` sibling is used when only
    /// the compressed file is present.
    pub fn zone_file(&self, kind: ZoneLayerKind) -> PathBuf {
        let plain = self.data_dir.join(kind.default_reference_file());
        if plain.exists() {
            return plain;
        }
        let compressed = self
            .data_dir
            .join(format!("{}.gz", kind.default_reference_file()));
        if compressed.exists() {
            compressed
        } else {
            plain
        }
    }

    pub fn zone_id_property(&self, kind: ZoneLayerKind) -> &str {
        let configured = match kind {
            ZoneLayerKind::Neighbourhood => self.neighbourhood_id_property.as_deref(),
            ZoneLayerKind::Arrondissement => self.arrondissement_id_property.as_deref(),
            ZoneLayerKind::Commune => self.commune_id_property.as_deref(),
        };
        configured.unwrap_or_else(|| kind.default_id_property())
    }

    pub fn station_output_path(&self) -> PathBuf {
        self.output_dir().join(STATION_OUTPUT_FILE_NAME)
    }

    pub fn zone_output_path(&self, kind: ZoneLayerKind) -> PathBuf {
        self.output_dir().join(kind.default_output_file())
    }
}
