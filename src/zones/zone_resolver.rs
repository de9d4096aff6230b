use crate::types::station::StationInformation;
use crate::types::zone::{ZoneIds, ZoneLayerKind};
use crate::zones::error::ZoneError;
use crate::zones::zone_layer::ZoneLayer;
use log::info;
use std::collections::BTreeMap;
use std::path::Path;

/// Assigns stations to zones by joining their positions against the three
/// reference layers.
///
/// Station positions and layer geometries must share the same coordinate
/// reference system; no reprojection is performed.
#[derive(Debug, Clone)]
pub struct ZoneResolver {
    neighbourhood: ZoneLayer,
    arrondissement: ZoneLayer,
    commune: ZoneLayer,
}

impl ZoneResolver {
    pub fn new(neighbourhood: ZoneLayer, arrondissement: ZoneLayer, commune: ZoneLayer) -> Self {
        Self {
            neighbourhood,
            arrondissement,
            commune,
        }
    }

    /// Loads all three layers; `source` yields the file and id property per layer.
    pub async fn load<F, P>(source: F) -> Result<Self, ZoneError>
    where
        F: Fn(ZoneLayerKind) -> (P, String),
        P: AsRef<Path>,
    {
        let load_layer = |kind| {
            let (path, id_property) = source(kind);
            async move { ZoneLayer::load(kind, path.as_ref(), &id_property).await }
        };
        let neighbourhood = load_layer(ZoneLayerKind::Neighbourhood).await?;
        let arrondissement = load_layer(ZoneLayerKind::Arrondissement).await?;
        let commune = load_layer(ZoneLayerKind::Commune).await?;
        Ok(Self::new(neighbourhood, arrondissement, commune))
    }

    pub fn layer(&self, kind: ZoneLayerKind) -> &ZoneLayer {
        match kind {
            ZoneLayerKind::Neighbourhood => &self.neighbourhood,
            ZoneLayerKind::Arrondissement => &self.arrondissement,
            ZoneLayerKind::Commune => &self.commune,
        }
    }

    /// Left join of the stations against each layer in turn: every station gets
    /// an entry, with `None` for layers where no polygon contains it.
    pub fn resolve(&self, stations: &[StationInformation]) -> BTreeMap<i64, ZoneIds> {
        if stations.is_empty() {
            return BTreeMap::new();
        }

        let mut joined: Vec<(&StationInformation, ZoneIds)> = stations
            .iter()
            .map(|station| (station, ZoneIds::default()))
            .collect();

        for kind in ZoneLayerKind::ALL {
            let layer = self.layer(kind);
            let mut matched = 0usize;
            for (station, ids) in joined.iter_mut() {
                let zone_id = layer.zone_id_at(station.lon, station.lat);
                matched += usize::from(zone_id.is_some());
                ids.set(kind, zone_id);
            }
            info!(
                "Joined {} stations against {} layer: {} matched",
                joined.len(),
                kind,
                matched
            );
        }

        joined
            .into_iter()
            .map(|(station, ids)| (station.station_id, ids))
            .collect()
    }

    /// Zone ids for a single position.
    pub fn resolve_point(&self, lon: f64, lat: f64) -> ZoneIds {
        let mut ids = ZoneIds::default();
        for kind in ZoneLayerKind::ALL {
            ids.set(kind, self.layer(kind).zone_id_at(lon, lat));
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zones::zone_layer::tests::square;
    use serde_json::json;

    fn station(id: i64, lon: f64, lat: f64) -> StationInformation {
        StationInformation::from_value(json!({"station_id": id, "lat": lat, "lon": lon})).unwrap()
    }

    /// Neighbourhoods: four unit squares. Arrondissements: two 2x1 halves.
    /// Communes: a single square covering only the western half.
    fn resolver() -> ZoneResolver {
        let neighbourhood = ZoneLayer::from_features(
            ZoneLayerKind::Neighbourhood,
            "c_quinsee",
            vec![
                square("c_quinsee", json!(1), (0.0, 0.0), 1.0),
                square("c_quinsee", json!(2), (1.0, 0.0), 1.0),
                square("c_quinsee", json!(3), (0.0, 1.0), 1.0),
                square("c_quinsee", json!(4), (1.0, 1.0), 1.0),
            ],
        );
        let arrondissement = ZoneLayer::from_features(
            ZoneLayerKind::Arrondissement,
            "c_arinsee",
            vec![
                square("c_arinsee", json!("10"), (0.0, 0.0), 1.0),
                square("c_arinsee", json!("10"), (0.0, 1.0), 1.0),
                square("c_arinsee", json!("20"), (1.0, 0.0), 1.0),
                square("c_arinsee", json!("20"), (1.0, 1.0), 1.0),
            ],
        );
        let commune = ZoneLayer::from_features(
            ZoneLayerKind::Commune,
            "insee",
            vec![square("insee", json!(75056), (0.0, 0.0), 1.0)],
        );
        ZoneResolver::new(neighbourhood, arrondissement, commune)
    }

    #[test]
    fn test_each_layer_resolves_exactly_one_zone() {
        let resolver = resolver();
        let stations = vec![
            station(100, 0.5, 0.5),
            station(101, 1.5, 0.5),
            station(102, 0.5, 1.5),
            station(103, 1.5, 1.5),
        ];
        let resolved = resolver.resolve(&stations);
        assert_eq!(resolved.len(), 4);
        assert_eq!(
            resolved[&100],
            ZoneIds {
                neighbourhood_id: Some(1),
                arrondissement_id: Some(10),
                commune_id: Some(75056),
            }
        );
        assert_eq!(
            resolved[&101],
            ZoneIds {
                neighbourhood_id: Some(2),
                arrondissement_id: Some(20),
                commune_id: None,
            }
        );
        assert_eq!(resolved[&102].neighbourhood_id, Some(3));
        assert_eq!(resolved[&103].arrondissement_id, Some(20));
        assert_eq!(resolved[&103].commune_id, None);
    }

    #[test]
    fn test_unmatched_station_gets_null_ids() {
        let resolved = resolver().resolve(&[station(7, 50.0, 50.0)]);
        assert_eq!(resolved[&7], ZoneIds::default());
    }

    #[test]
    fn test_resolve_empty_input() {
        assert!(resolver().resolve(&[]).is_empty());
    }

    #[test]
    fn test_resolve_point_matches_batch() {
        let resolver = resolver();
        let batch = resolver.resolve(&[station(1, 1.25, 1.75)]);
        assert_eq!(resolver.resolve_point(1.25, 1.75), batch[&1]);
    }
}
