use crate::metrics::aggregates::AggregateRow;
use crate::projection::error::ProjectionError;
use crate::types::grid::{AggregateGrid, CellAverage, GridSpec};
use crate::types::station::StationInformation;
use crate::types::zone::coerce_zone_id;
use crate::utils::write_atomically;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use log::{debug, info};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Property under which the grid is attached to each output feature.
pub const VALUES_PROPERTY: &str = "values";

/// What to do with a feature that has no aggregate rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyEntityPolicy {
    /// Emit the feature with an all-zero grid (stations).
    Keep,
    /// Leave the feature out of the output (zones).
    Drop,
}

/// Merges aggregate rows back onto entity geometries as dense day/hour grids.
#[derive(Debug, Clone, Copy, Default)]
pub struct Projector {
    grid: GridSpec,
}

impl Projector {
    pub fn new(grid: GridSpec) -> Self {
        Self { grid }
    }

    pub fn grid(&self) -> GridSpec {
        self.grid
    }

    /// One grid per entity that has at least one row. Rows outside the grid
    /// still mark their entity as present but fill no cell.
    pub fn grids(&self, rows: &[AggregateRow]) -> BTreeMap<i64, AggregateGrid> {
        let mut grids = BTreeMap::new();
        let mut ignored = 0usize;
        for row in rows {
            let grid = grids
                .entry(row.entity_id)
                .or_insert_with(|| AggregateGrid::zeroed(self.grid));
            let cell = CellAverage {
                mechanical_avg: row.mechanical_avg,
                ebike_avg: row.ebike_avg,
            };
            if !grid.set(row.day_of_week, row.hour_of_day, cell) {
                ignored += 1;
            }
        }
        if ignored > 0 {
            debug!("Ignored {} aggregate rows outside the output grid", ignored);
        }
        grids
    }

    /// Copies every feature and attaches its grid under [`VALUES_PROPERTY`].
    ///
    /// Features are matched to rows through `id_property`, compared as integers
    /// so `"7511201"` and `7511201` are the same entity.
    pub fn project(
        &self,
        features: &[Feature],
        id_property: &str,
        rows: &[AggregateRow],
        policy: EmptyEntityPolicy,
    ) -> FeatureCollection {
        let grids = self.grids(rows);
        let mut dropped = 0usize;

        let features: Vec<Feature> = features
            .iter()
            .filter_map(|feature| {
                let grid = feature
                    .property(id_property)
                    .and_then(coerce_zone_id)
                    .and_then(|id| grids.get(&id));
                let values = match (grid, policy) {
                    (Some(grid), _) => grid.to_json(),
                    (None, EmptyEntityPolicy::Keep) => AggregateGrid::zeroed(self.grid).to_json(),
                    (None, EmptyEntityPolicy::Drop) => {
                        dropped += 1;
                        return None;
                    }
                };
                let mut feature = feature.clone();
                feature.set_property(VALUES_PROPERTY, values);
                Some(feature)
            })
            .collect();

        if dropped > 0 {
            debug!(
                "Dropped {} features without aggregates (matched on '{}')",
                dropped, id_property
            );
        }

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

/// Point features for the live stations, carrying only `station_id`.
pub fn station_features(stations: &[StationInformation]) -> Vec<Feature> {
    stations
        .iter()
        .map(|station| {
            let mut properties = JsonObject::new();
            properties.insert("station_id".to_string(), Value::from(station.station_id));
            Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::Point(vec![
                    station.lon,
                    station.lat,
                ]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect()
}

/// Serializes `collection` and replaces the file at `path` atomically.
pub fn write_collection(path: &Path, collection: &FeatureCollection) -> Result<(), ProjectionError> {
    let bytes = serde_json::to_vec(collection)
        .map_err(|e| ProjectionError::Encode(path.to_path_buf(), e))?;
    write_atomically(path, &bytes).map_err(|e| ProjectionError::Write(path.to_path_buf(), e))?;
    info!(
        "Wrote {} features to {}",
        collection.features.len(),
        path.display()
    );
    Ok(())
}
