use chrono::NaiveDate;
use serde_json::{json, Value};
use std::path::Path;
use velostat::{
    BatchRun, FeedSource, MetricsError, MetricsStore, PipelineConfig, Velostat, VelostatError,
    ZoneLayerKind,
};

fn square(id_property: &str, id: Value, min: (f64, f64), size: f64) -> Value {
    let (x, y) = min;
    let name = format!("zone {}", id);
    json!({
        "type": "Feature",
        "properties": {id_property: id, "name": name},
        "geometry": {
            "type": "Polygon",
            "coordinates": [[[x, y], [x + size, y], [x + size, y + size], [x, y + size], [x, y]]]
        }
    })
}

fn write_json(path: &Path, value: &Value) {
    std::fs::write(path, serde_json::to_vec(value).unwrap()).unwrap();
}

/// Two populated neighbourhoods and one empty one, a single arrondissement and
/// a single commune covering the populated area.
fn write_zones(data_dir: &Path) {
    write_json(
        &data_dir.join("quartier_paris.geojson"),
        &json!({"type": "FeatureCollection", "features": [
            square("c_quinsee", json!("7511201"), (2.0, 48.0), 0.5),
            square("c_quinsee", json!(7511202), (2.5, 48.0), 0.5),
            square("c_quinsee", json!(7511203), (5.0, 5.0), 0.5),
        ]}),
    );
    write_json(
        &data_dir.join("arrondissements.geojson"),
        &json!({"type": "FeatureCollection", "features": [
            square("c_arinsee", json!(75112), (2.0, 48.0), 1.0),
        ]}),
    );
    write_json(
        &data_dir.join("communes-dile-de-france-au-01-janvier.geojson"),
        &json!({"type": "FeatureCollection", "features": [
            square("insee", json!("75056"), (2.0, 48.0), 1.0),
        ]}),
    );
}

fn information_feed() -> Value {
    json!({"data": {"stations": [
        {"station_id": 1, "name": "A", "lat": 48.2, "lon": 2.2, "capacity": 20},
        {"station_id": 2, "name": "B", "lat": 48.3, "lon": 2.3, "capacity": 30},
        {"station_id": 3, "name": "C", "lat": 48.2, "lon": 2.7, "capacity": 12},
        {"station_id": 4, "name": "D", "lat": 10.0, "lon": 10.0, "capacity": 8}
    ]}})
}

fn status(station_id: i64, mechanical: u32, ebike: u32) -> Value {
    json!({
        "station_id": station_id,
        "num_bikes_available": mechanical + ebike,
        "num_docks_available": 10,
        "num_bikes_available_types": [{"mechanical": mechanical}, {"ebike": ebike}]
    })
}

fn status_feed(records: Vec<Value>) -> Value {
    json!({"data": {"stations": records}})
}

struct Fixture {
    _dir: tempfile::TempDir,
    data_dir: std::path::PathBuf,
    status_path: std::path::PathBuf,
    information_path: std::path::PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        std::fs::create_dir_all(&data_dir).unwrap();
        write_zones(&data_dir);

        let status_path = dir.path().join("station_status.json");
        let information_path = dir.path().join("station_information.json");
        write_json(&information_path, &information_feed());
        Self {
            _dir: dir,
            data_dir,
            status_path,
            information_path,
        }
    }

    fn write_status(&self, records: Vec<Value>) {
        write_json(&self.status_path, &status_feed(records));
    }

    fn pipeline(&self) -> Velostat {
        let config = PipelineConfig::builder()
            .data_dir(self.data_dir.clone())
            .status_feed(FeedSource::File(self.status_path.clone()))
            .information_feed(FeedSource::File(self.information_path.clone()))
            .build();
        Velostat::new(config)
    }

    fn output(&self, name: &str) -> Value {
        let path = self.data_dir.join("output").join(name);
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }
}

fn wednesday_at(hour: u32, minute: u32) -> BatchRun {
    let ts = NaiveDate::from_ymd_opt(2024, 5, 15)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap();
    BatchRun::at(ts)
}

fn feature_with<'a>(collection: &'a Value, property: &str, id: &Value) -> &'a Value {
    collection["features"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| &f["properties"][property] == id)
        .unwrap()
}

#[tokio::test]
async fn test_full_run_writes_all_outputs() {
    let fixture = Fixture::new();
    fixture.write_status(vec![status(1, 2, 1), status(2, 4, 3), status(3, 1, 0), status(4, 5, 5)]);

    let summary = fixture.pipeline().run_at(wednesday_at(9, 5)).await.unwrap();
    assert_eq!(summary.live_stations, 4);
    assert_eq!(summary.resolved_stations, 4);
    assert_eq!(summary.samples_appended, 4);
    assert_eq!(summary.station_features, 4);
    assert_eq!(summary.zone_features[&ZoneLayerKind::Neighbourhood], 2);

    // Stations are all kept, each with a full grid.
    let stations = fixture.output("stations.geojson");
    assert_eq!(stations["features"].as_array().unwrap().len(), 4);
    let outside = feature_with(&stations, "station_id", &json!(4));
    assert_eq!(outside["geometry"]["coordinates"], json!([10.0, 10.0]));
    let values = outside["properties"]["values"].as_object().unwrap();
    assert_eq!(values.len(), 7);
    assert!(values.values().all(|hours| hours.as_object().unwrap().len() == 24));
    assert_eq!(values["2"]["9"]["mechanical_avg"], json!(5.0));

    // The empty neighbourhood is dropped; the string-keyed one still matches.
    let nhood = fixture.output("nhood.geojson");
    assert_eq!(nhood["features"].as_array().unwrap().len(), 2);
    let first = feature_with(&nhood, "c_quinsee", &json!("7511201"));
    assert_eq!(
        first["properties"]["values"]["2"]["9"],
        json!({"mechanical_avg": 6.0, "ebike_avg": 4.0})
    );
    assert_eq!(first["properties"]["name"], json!("zone \"7511201\""));
    let second = feature_with(&nhood, "c_quinsee", &json!(7511202));
    assert_eq!(second["properties"]["values"]["2"]["9"]["mechanical_avg"], json!(1.0));

    let arrond = fixture.output("arrond.geojson");
    let zone = feature_with(&arrond, "c_arinsee", &json!(75112));
    assert_eq!(
        zone["properties"]["values"]["2"]["9"],
        json!({"mechanical_avg": 7.0, "ebike_avg": 4.0})
    );

    let commune = fixture.output("commune.geojson");
    assert_eq!(commune["features"].as_array().unwrap().len(), 1);

    let cache: Value =
        serde_json::from_slice(&std::fs::read(fixture.data_dir.join("stations.json")).unwrap())
            .unwrap();
    assert_eq!(cache["stations"]["1"]["neighbourhood_id"], json!(7511201));
    assert_eq!(cache["stations"]["1"]["commune_id"], json!(75056));
    assert_eq!(cache["stations"]["4"]["arrondissement_id"], Value::Null);
}

#[tokio::test]
async fn test_second_run_reuses_cache_and_averages_run_sums() {
    let fixture = Fixture::new();
    fixture.write_status(vec![status(1, 2, 1), status(2, 4, 3), status(3, 1, 0), status(4, 0, 0)]);
    fixture.pipeline().run_at(wednesday_at(9, 5)).await.unwrap();
    let cache_after_first =
        std::fs::read(fixture.data_dir.join("stations.json")).unwrap();

    fixture.write_status(vec![status(1, 0, 0), status(2, 2, 1), status(3, 1, 0), status(4, 0, 0)]);
    let summary = fixture.pipeline().run_at(wednesday_at(9, 35)).await.unwrap();
    assert_eq!(summary.resolved_stations, 0);
    assert_eq!(summary.cached_stations, 4);

    let cache_after_second =
        std::fs::read(fixture.data_dir.join("stations.json")).unwrap();
    assert_eq!(cache_after_first, cache_after_second);

    let store = MetricsStore::open(&fixture.data_dir.join("data.db")).unwrap();
    assert_eq!(store.row_count().unwrap(), 8);

    let nhood = fixture.output("nhood.geojson");
    let first = feature_with(&nhood, "c_quinsee", &json!("7511201"));
    assert_eq!(
        first["properties"]["values"]["2"]["9"],
        json!({"mechanical_avg": 4.0, "ebike_avg": 2.5})
    );
}

#[tokio::test]
async fn test_fetch_failure_persists_nothing() {
    let fixture = Fixture::new();
    // No status feed written.
    let err = fixture.pipeline().run_at(wednesday_at(9, 5)).await.unwrap_err();
    assert!(err.is_fetch_failure());
    assert!(!fixture.data_dir.join("stations.json").exists());
    assert!(!fixture.data_dir.join("data.db").exists());
}

#[tokio::test]
async fn test_status_for_unknown_station_aborts_ingestion() {
    let fixture = Fixture::new();
    fixture.write_status(vec![status(1, 1, 1), status(99, 1, 1)]);
    let err = fixture.pipeline().run_at(wednesday_at(9, 5)).await.unwrap_err();
    assert!(!err.is_fetch_failure());
    assert!(matches!(
        err,
        VelostatError::Metrics(MetricsError::MissingCacheEntry { station_id: 99 })
    ));

    let store = MetricsStore::open(&fixture.data_dir.join("data.db")).unwrap();
    assert_eq!(store.row_count().unwrap(), 0);
}
