use crate::stations::error::StationCacheError;
use crate::types::station::{EnrichedStation, StationInformation};
use crate::types::zone::ZoneIds;
use crate::utils::write_atomically;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::Path;

pub const CACHE_FORMAT_VERSION: u64 = 1;

/// Persistent mapping from station id to its enriched record.
///
/// The cache is the single source of truth for zone assignment. Stations are
/// added on first sighting and updated when their feed record changes, but are
/// never removed: a station that disappears from the feed keeps its entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationCache {
    stations: BTreeMap<i64, EnrichedStation>,
}

#[derive(Serialize)]
struct CacheDocument<'a> {
    format_version: u64,
    stations: &'a BTreeMap<i64, EnrichedStation>,
}

impl StationCache {
    /// Loads the cache document at `path`. A missing file yields an empty cache.
    pub fn load(path: &Path) -> Result<Self, StationCacheError> {
        if !path.exists() {
            info!(
                "Station cache not found at {}. Starting from an empty cache.",
                path.display()
            );
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path)
            .map_err(|e| StationCacheError::CacheRead(path.to_path_buf(), e))?;
        let document: Value = serde_json::from_slice(&bytes)
            .map_err(|e| StationCacheError::CacheDecode(path.to_path_buf(), e))?;
        let cache = Self::from_document(path, document)?;
        info!(
            "Loaded {} cached stations from {}",
            cache.len(),
            path.display()
        );
        Ok(cache)
    }

    // Accepts both the versioned document and the older flat `{"<id>": {...}}` map.
    fn from_document(path: &Path, document: Value) -> Result<Self, StationCacheError> {
        let records = match document {
            Value::Object(mut map) if map.contains_key("format_version") => {
                let found = map
                    .remove("format_version")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                if found != CACHE_FORMAT_VERSION {
                    return Err(StationCacheError::UnsupportedVersion {
                        path: path.to_path_buf(),
                        found,
                        supported: CACHE_FORMAT_VERSION,
                    });
                }
                let stations = map
                    .remove("stations")
                    .unwrap_or_else(|| Value::Object(Default::default()));
                serde_json::from_value::<BTreeMap<String, EnrichedStation>>(stations)
            }
            legacy => serde_json::from_value::<BTreeMap<String, EnrichedStation>>(legacy),
        }
        .map_err(|e| StationCacheError::CacheDecode(path.to_path_buf(), e))?;

        let stations = records
            .into_values()
            .map(|station| (station.station_id, station))
            .collect();
        Ok(Self { stations })
    }

    /// Rewrites the whole cache document. The write goes through a temporary file
    /// so a crash leaves the previous document intact.
    pub fn persist(&self, path: &Path) -> Result<(), StationCacheError> {
        let document = CacheDocument {
            format_version: CACHE_FORMAT_VERSION,
            stations: &self.stations,
        };
        let bytes = serde_json::to_vec(&document).map_err(StationCacheError::CacheEncode)?;
        write_atomically(path, &bytes)
            .map_err(|e| StationCacheError::CacheWrite(path.to_path_buf(), e))?;
        info!(
            "Wrote {} stations ({} bytes) to {}",
            self.stations.len(),
            bytes.len(),
            path.display()
        );
        Ok(())
    }

    /// Merges the live station list into the cache and returns the stations whose
    /// zones need (re)resolution: new stations, and known stations whose feed
    /// record differs from the cached snapshot.
    pub fn reconcile(&mut self, live: &[StationInformation]) -> Vec<StationInformation> {
        let mut changed = Vec::new();
        let mut added = 0usize;

        for information in live {
            match self.stations.entry(information.station_id) {
                Entry::Occupied(mut entry) => {
                    if entry.get().base != information.base {
                        debug!("Updating station {}", information.station_id);
                        entry.get_mut().base = information.base.clone();
                        changed.push(information.clone());
                    }
                }
                Entry::Vacant(entry) => {
                    debug!("Adding station {}", information.station_id);
                    entry.insert(EnrichedStation::new(information));
                    added += 1;
                    changed.push(information.clone());
                }
            }
        }

        info!(
            "Reconciled {} live stations: {} new, {} updated, {} cached in total",
            live.len(),
            added,
            changed.len() - added,
            self.stations.len()
        );
        changed
    }

    /// Stores resolved zone ids. Stations absent from `resolved` keep their ids.
    pub fn apply_zone_ids(&mut self, resolved: &BTreeMap<i64, ZoneIds>) {
        for (station_id, ids) in resolved {
            match self.stations.get_mut(station_id) {
                Some(station) => station.set_zone_ids(*ids),
                None => warn!(
                    "Resolved zones for station {} which is not in the cache, ignoring",
                    station_id
                ),
            }
        }
    }

    pub fn get(&self, station_id: i64) -> Option<&EnrichedStation> {
        self.stations.get(&station_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnrichedStation> {
        self.stations.values()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}
