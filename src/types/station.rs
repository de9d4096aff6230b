//! Records read from the station feeds and the enriched record kept in the station cache.

use crate::types::zone::ZoneIds;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Envelope shared by the GBFS documents: `{"data": {"stations": [...]}}`.
#[derive(Debug, Deserialize)]
pub struct FeedDocument<T> {
    pub data: FeedData<T>,
}

#[derive(Debug, Deserialize)]
pub struct FeedData<T> {
    pub stations: Vec<T>,
}

/// A station record from the station-information feed.
///
/// The full record is kept as `base`, an opaque snapshot that is only compared
/// for change detection. The typed fields are the ones needed for the spatial join.
#[derive(Debug, Clone, PartialEq)]
pub struct StationInformation {
    pub station_id: i64,
    pub lat: f64,
    pub lon: f64,
    pub base: Value,
}

#[derive(Deserialize)]
struct StationPosition {
    #[serde(deserialize_with = "deserialize_station_id")]
    station_id: i64,
    lat: f64,
    lon: f64,
}

impl StationInformation {
    pub fn from_value(base: Value) -> Result<Self, serde_json::Error> {
        let position = StationPosition::deserialize(&base)?;
        Ok(Self {
            station_id: position.station_id,
            lat: position.lat,
            lon: position.lon,
            base,
        })
    }
}

/// A live availability record from the station-status feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationStatus {
    #[serde(deserialize_with = "deserialize_station_id")]
    pub station_id: i64,
    #[serde(default)]
    pub num_bikes_available: u32,
    #[serde(default)]
    pub num_docks_available: u32,
    /// Bucketed counts, e.g. `[{"mechanical": 3}, {"ebike": 1}]`.
    #[serde(default)]
    pub num_bikes_available_types: Vec<HashMap<String, u32>>,
}

impl StationStatus {
    fn first_bucket(&self, kind: &str) -> u32 {
        self.num_bikes_available_types
            .iter()
            .find_map(|bucket| bucket.get(kind).copied())
            .unwrap_or(0)
    }

    pub fn mechanical_count(&self) -> u32 {
        self.first_bucket("mechanical")
    }

    pub fn ebike_count(&self) -> u32 {
        self.first_bucket("ebike")
    }

    /// Share of occupied docks: bikes / (bikes + free docks).
    /// A station reporting neither bikes nor docks yields 0.
    pub fn availability_ratio(&self) -> f64 {
        let total = self.num_bikes_available + self.num_docks_available;
        if total == 0 {
            0.0
        } else {
            f64::from(self.num_bikes_available) / f64::from(total)
        }
    }
}

/// A station as held by the enrichment cache: its last seen feed record and
/// the zone ids resolved for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedStation {
    #[serde(deserialize_with = "deserialize_station_id")]
    pub station_id: i64,
    pub neighbourhood_id: Option<i64>,
    #[serde(alias = "arrondissment_id")]
    pub arrondissement_id: Option<i64>,
    pub commune_id: Option<i64>,
    pub base: Value,
}

impl EnrichedStation {
    /// A freshly sighted station; zone ids are filled in by the resolver.
    pub fn new(information: &StationInformation) -> Self {
        Self {
            station_id: information.station_id,
            neighbourhood_id: None,
            arrondissement_id: None,
            commune_id: None,
            base: information.base.clone(),
        }
    }

    pub fn zone_ids(&self) -> ZoneIds {
        ZoneIds {
            neighbourhood_id: self.neighbourhood_id,
            arrondissement_id: self.arrondissement_id,
            commune_id: self.commune_id,
        }
    }

    pub fn set_zone_ids(&mut self, ids: ZoneIds) {
        self.neighbourhood_id = ids.neighbourhood_id;
        self.arrondissement_id = ids.arrondissement_id;
        self.commune_id = ids.commune_id;
    }
}

/// Station ids are integers, but some feeds ship them as numeric strings.
fn deserialize_station_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Int(id) => Ok(id),
        RawId::Text(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|_| de::Error::custom(format!("station id '{text}' is not an integer"))),
    }
}
