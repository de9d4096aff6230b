use crate::metrics::aggregates::{aggregate_rows, AggregateKey, AggregateRow};
use crate::metrics::error::MetricsError;
use crate::stations::station_cache::StationCache;
use crate::types::run::{BatchRun, MetricSample};
use crate::types::station::StationStatus;
use log::{debug, info};
use polars::prelude::*;
use rusqlite::{params, Connection};
use std::path::Path;

/// Columns of the `stations` fact table, in storage order.
pub const TABLE_COLUMNS: [&str; 9] = [
    "station_id",
    "neighbourhood_id",
    "arrondissement_id",
    "commune_id",
    "timestamp",
    "day",
    "time_hr",
    "mechanical_count",
    "ebike_count",
];

/// Declared type and NOT NULL flag per column, as reported by `PRAGMA table_info`.
const TABLE_SCHEMA: [(&str, &str, bool); 9] = [
    ("station_id", "INTEGER", true),
    ("neighbourhood_id", "INTEGER", false),
    ("arrondissement_id", "INTEGER", false),
    ("commune_id", "INTEGER", false),
    ("timestamp", "TEXT", true),
    ("day", "INTEGER", true),
    ("time_hr", "INTEGER", true),
    ("mechanical_count", "INTEGER", false),
    ("ebike_count", "INTEGER", false),
];

const CREATE_TABLE_SQL: &str = "CREATE TABLE stations (
    station_id INTEGER NOT NULL,
    neighbourhood_id INTEGER,
    arrondissement_id INTEGER,
    commune_id INTEGER,
    timestamp TEXT NOT NULL,
    day INTEGER NOT NULL,
    time_hr INTEGER NOT NULL,
    mechanical_count INTEGER,
    ebike_count INTEGER
)";

const INSERT_SQL: &str = "INSERT INTO stations (
    station_id, neighbourhood_id, arrondissement_id, commune_id,
    timestamp, day, time_hr, mechanical_count, ebike_count
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

/// Append-only store of availability samples, one row per station per run.
#[derive(Debug)]
pub struct MetricsStore {
    conn: Connection,
}

impl MetricsStore {
    /// Opens (or creates) the database at `path`. The fact table is created on
    /// first use; an existing table whose columns, types or NOT NULL constraints
    /// differ is an error.
    pub fn open(path: &Path) -> Result<Self, MetricsError> {
        let conn =
            Connection::open(path).map_err(|e| MetricsError::Open(path.to_path_buf(), e))?;
        let store = Self { conn };
        store.ensure_schema()?;
        info!("Opened metrics store at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, MetricsError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<(), MetricsError> {
        let mut found = self.table_columns()?;
        if found.is_empty() {
            info!("Metrics table does not exist yet, creating it");
            self.conn.execute_batch(CREATE_TABLE_SQL)?;
            found = self.table_columns()?;
        }
        let expected: Vec<String> = TABLE_SCHEMA
            .iter()
            .map(|(name, declared_type, not_null)| describe_column(name, declared_type, *not_null))
            .collect();
        if found != expected {
            return Err(MetricsError::SchemaMismatch { expected, found });
        }
        Ok(())
    }

    /// Columns of the existing table as `name TYPE [NOT NULL]`, empty when absent.
    fn table_columns(&self) -> Result<Vec<String>, MetricsError> {
        let mut stmt = self.conn.prepare("PRAGMA table_info(stations)")?;
        let columns = stmt
            .query_map([], |row| {
                let name: String = row.get(1)?;
                let declared_type: String = row.get(2)?;
                let not_null: bool = row.get(3)?;
                Ok(describe_column(&name, &declared_type, not_null))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    /// Appends one sample per status record, all stamped with `run`.
    ///
    /// Zone ids come from the cache. If any status refers to a station missing
    /// from the cache nothing is written.
    pub fn append(
        &mut self,
        run: &BatchRun,
        statuses: &[StationStatus],
        cache: &StationCache,
    ) -> Result<usize, MetricsError> {
        let samples = samples_for_run(run, statuses, cache)?;

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(INSERT_SQL)?;
            for sample in &samples {
                stmt.execute(params![
                    sample.station_id,
                    sample.neighbourhood_id,
                    sample.arrondissement_id,
                    sample.commune_id,
                    sample.timestamp,
                    sample.day_of_week,
                    sample.hour_of_day,
                    sample.mechanical_count,
                    sample.ebike_count,
                ])?;
            }
        }
        tx.commit()?;

        let mean_ratio = if statuses.is_empty() {
            0.0
        } else {
            statuses
                .iter()
                .map(StationStatus::availability_ratio)
                .sum::<f64>()
                / statuses.len() as f64
        };
        info!(
            "Appended {} samples for run {} (day {}, hour {}), mean fill ratio {:.3}",
            samples.len(),
            run.timestamp_key(),
            run.day_of_week,
            run.hour_of_day,
            mean_ratio
        );
        Ok(samples.len())
    }

    pub fn row_count(&self) -> Result<usize, MetricsError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM stations", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Loads every stored sample into a frame with the table's columns.
    pub fn history(&self) -> Result<DataFrame, MetricsError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM stations", TABLE_COLUMNS.join(", ")))?;
        let mut rows = stmt.query([])?;

        let mut station_ids: Vec<i64> = Vec::new();
        let mut neighbourhood_ids: Vec<Option<i64>> = Vec::new();
        let mut arrondissement_ids: Vec<Option<i64>> = Vec::new();
        let mut commune_ids: Vec<Option<i64>> = Vec::new();
        let mut timestamps: Vec<String> = Vec::new();
        let mut days: Vec<i64> = Vec::new();
        let mut hours: Vec<i64> = Vec::new();
        let mut mechanical: Vec<Option<i64>> = Vec::new();
        let mut ebike: Vec<Option<i64>> = Vec::new();

        while let Some(row) = rows.next()? {
            station_ids.push(row.get(0)?);
            neighbourhood_ids.push(row.get(1)?);
            arrondissement_ids.push(row.get(2)?);
            commune_ids.push(row.get(3)?);
            timestamps.push(row.get(4)?);
            days.push(row.get(5)?);
            hours.push(row.get(6)?);
            mechanical.push(row.get(7)?);
            ebike.push(row.get(8)?);
        }
        debug!("Loaded {} history rows", station_ids.len());

        let frame = df!(
            "station_id" => station_ids,
            "neighbourhood_id" => neighbourhood_ids,
            "arrondissement_id" => arrondissement_ids,
            "commune_id" => commune_ids,
            "timestamp" => timestamps,
            "day" => days,
            "time_hr" => hours,
            "mechanical_count" => mechanical,
            "ebike_count" => ebike
        )?;
        Ok(frame)
    }

    /// Recomputes aggregates for `key` over the full history.
    pub fn aggregates(&self, key: AggregateKey) -> Result<Vec<AggregateRow>, MetricsError> {
        aggregate_rows(&self.history()?, key)
    }
}

fn describe_column(name: &str, declared_type: &str, not_null: bool) -> String {
    let mut column = format!("{} {}", name, declared_type.to_uppercase());
    if not_null {
        column.push_str(" NOT NULL");
    }
    column
}

/// Builds the rows for one run. Fails on the first status whose station has no
/// cache entry.
pub fn samples_for_run(
    run: &BatchRun,
    statuses: &[StationStatus],
    cache: &StationCache,
) -> Result<Vec<MetricSample>, MetricsError> {
    let timestamp = run.timestamp_key();
    statuses
        .iter()
        .map(|status| {
            let station = cache
                .get(status.station_id)
                .ok_or(MetricsError::MissingCacheEntry {
                    station_id: status.station_id,
                })?;
            Ok(MetricSample {
                station_id: status.station_id,
                neighbourhood_id: station.neighbourhood_id,
                arrondissement_id: station.arrondissement_id,
                commune_id: station.commune_id,
                timestamp: timestamp.clone(),
                day_of_week: run.day_of_week,
                hour_of_day: run.hour_of_day,
                mechanical_count: status.mechanical_count(),
                ebike_count: status.ebike_count(),
            })
        })
        .collect()
}
