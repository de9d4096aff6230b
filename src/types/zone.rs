//! Zone layers and the per-station zone assignment.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One of the three nested administrative boundary layers a station is joined against.
///
/// The declaration order is the join order: neighbourhood first, then district
/// (arrondissement), then municipality (commune).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ZoneLayerKind {
    Neighbourhood,
    Arrondissement,
    Commune,
}

impl ZoneLayerKind {
    /// All layers in join order.
    pub const ALL: [ZoneLayerKind; 3] = [
        ZoneLayerKind::Neighbourhood,
        ZoneLayerKind::Arrondissement,
        ZoneLayerKind::Commune,
    ];

    /// Column holding this layer's zone id in the metrics table.
    pub fn column_name(&self) -> &'static str {
        match self {
            ZoneLayerKind::Neighbourhood => "neighbourhood_id",
            ZoneLayerKind::Arrondissement => "arrondissement_id",
            ZoneLayerKind::Commune => "commune_id",
        }
    }

    /// Identifier property carried by the features of the reference layer.
    pub fn default_id_property(&self) -> &'static str {
        match self {
            ZoneLayerKind::Neighbourhood => "c_quinsee",
            ZoneLayerKind::Arrondissement => "c_arinsee",
            ZoneLayerKind::Commune => "insee",
        }
    }

    pub fn default_reference_file(&self) -> &'static str {
        match self {
            ZoneLayerKind::Neighbourhood => "quartier_paris.geojson",
            ZoneLayerKind::Arrondissement => "arrondissements.geojson",
            ZoneLayerKind::Commune => "communes-dile-de-france-au-01-janvier.geojson",
        }
    }

    pub fn default_output_file(&self) -> &'static str {
        match self {
            ZoneLayerKind::Neighbourhood => "nhood.geojson",
            ZoneLayerKind::Arrondissement => "arrond.geojson",
            ZoneLayerKind::Commune => "commune.geojson",
        }
    }
}

impl fmt::Display for ZoneLayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ZoneLayerKind::Neighbourhood => "neighbourhood",
            ZoneLayerKind::Arrondissement => "arrondissement",
            ZoneLayerKind::Commune => "commune",
        };
        f.write_str(name)
    }
}

/// The resolved zone id of a station for each layer. `None` means no polygon of
/// that layer contains the station, or the containing polygon had no usable id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneIds {
    pub neighbourhood_id: Option<i64>,
    pub arrondissement_id: Option<i64>,
    pub commune_id: Option<i64>,
}

impl ZoneIds {
    pub fn get(&self, kind: ZoneLayerKind) -> Option<i64> {
        match kind {
            ZoneLayerKind::Neighbourhood => self.neighbourhood_id,
            ZoneLayerKind::Arrondissement => self.arrondissement_id,
            ZoneLayerKind::Commune => self.commune_id,
        }
    }

    pub fn set(&mut self, kind: ZoneLayerKind, zone_id: Option<i64>) {
        match kind {
            ZoneLayerKind::Neighbourhood => self.neighbourhood_id = zone_id,
            ZoneLayerKind::Arrondissement => self.arrondissement_id = zone_id,
            ZoneLayerKind::Commune => self.commune_id = zone_id,
        }
    }
}

/// Coerces a feature attribute into an integer id.
///
/// Integers, floats without a fractional part and numeric strings are accepted.
/// Everything else (null, booleans, free text, objects) yields `None`.
pub fn coerce_zone_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>().ok().or_else(|| {
                text.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}
