//! The batch run: fetch, reconcile, resolve, persist, ingest, aggregate, project.

use crate::config::PipelineConfig;
use crate::error::VelostatError;
use crate::feeds::feed_loader::FeedLoader;
use crate::metrics::aggregates::{aggregate_rows, AggregateKey};
use crate::metrics::metrics_store::MetricsStore;
use crate::projection::projector::{station_features, write_collection, EmptyEntityPolicy, Projector};
use crate::stations::station_cache::StationCache;
use crate::types::run::BatchRun;
use crate::types::zone::ZoneLayerKind;
use crate::utils::ensure_dir_exists;
use crate::zones::zone_resolver::ZoneResolver;
use log::info;
use std::collections::BTreeMap;
use std::path::Path;

/// Counts reported by a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run: BatchRun,
    pub live_stations: usize,
    pub resolved_stations: usize,
    pub cached_stations: usize,
    pub samples_appended: usize,
    pub station_features: usize,
    pub zone_features: BTreeMap<ZoneLayerKind, usize>,
}

/// Runs the pipeline against one data directory.
///
/// Runs against the same directory must not overlap; nothing here locks the
/// cache or the metrics store.
///
/// ```no_run
/// # use velostat::{PipelineConfig, Velostat, VelostatError};
/// # async fn run() -> Result<(), VelostatError> {
/// let config = PipelineConfig::builder().data_dir("/srv/velostat").build();
/// let summary = Velostat::new(config).run().await?;
/// println!("appended {} samples", summary.samples_appended);
/// # Ok(())
/// # }
/// ```
pub struct Velostat {
    config: PipelineConfig,
    feeds: FeedLoader,
    projector: Projector,
}

impl Velostat {
    pub fn new(config: PipelineConfig) -> Self {
        let feeds = FeedLoader::new(
            config.status_feed().clone(),
            config.information_feed().clone(),
        );
        let projector = Projector::new(config.grid());
        Self {
            config,
            feeds,
            projector,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// One run stamped with the current local time.
    pub async fn run(&self) -> Result<RunSummary, VelostatError> {
        self.run_at(BatchRun::now()).await
    }

    pub async fn run_at(&self, run: BatchRun) -> Result<RunSummary, VelostatError> {
        info!("Starting run {}", run.timestamp_key());
        let data_dir = self.config.data_dir().to_path_buf();
        let output_dir = self.config.output_dir();
        create_dir(&data_dir).await?;
        create_dir(&output_dir).await?;

        // Both feeds are read before any state is touched.
        let statuses = self.feeds.fetch_station_status().await?;
        let stations = self.feeds.fetch_station_information().await?;

        let config = &self.config;
        let resolver = ZoneResolver::load(|kind| {
            (
                config.zone_file(kind),
                config.zone_id_property(kind).to_string(),
            )
        })
        .await?;

        let cache_path = config.cache_path();
        let mut cache = StationCache::load(&cache_path)?;
        let changed = cache.reconcile(&stations);
        if changed.is_empty() {
            info!("No new or changed stations, zone assignment skipped");
        } else {
            cache.apply_zone_ids(&resolver.resolve(&changed));
        }
        cache.persist(&cache_path)?;

        let mut store = MetricsStore::open(&config.database_path())?;
        let samples_appended = store.append(&run, &statuses, &cache)?;

        let history = store.history()?;
        let station_rows = aggregate_rows(&history, AggregateKey::Station)?;
        let station_collection = self.projector.project(
            &station_features(&stations),
            "station_id",
            &station_rows,
            EmptyEntityPolicy::Keep,
        );
        write_collection(&config.station_output_path(), &station_collection)?;

        let mut zone_features = BTreeMap::new();
        for kind in ZoneLayerKind::ALL {
            let rows = aggregate_rows(&history, AggregateKey::Zone(kind))?;
            let layer = resolver.layer(kind);
            let collection = self.projector.project(
                layer.features(),
                layer.id_property(),
                &rows,
                EmptyEntityPolicy::Drop,
            );
            write_collection(&config.zone_output_path(kind), &collection)?;
            zone_features.insert(kind, collection.features.len());
        }

        let summary = RunSummary {
            run,
            live_stations: stations.len(),
            resolved_stations: changed.len(),
            cached_stations: cache.len(),
            samples_appended,
            station_features: station_collection.features.len(),
            zone_features,
        };
        info!(
            "Run {} finished: {} live stations, {} resolved, {} samples appended",
            run.timestamp_key(),
            summary.live_stations,
            summary.resolved_stations,
            summary.samples_appended
        );
        Ok(summary)
    }
}

async fn create_dir(path: &Path) -> Result<(), VelostatError> {
    ensure_dir_exists(path)
        .await
        .map_err(|e| VelostatError::DirCreation(path.to_path_buf(), e))
}
