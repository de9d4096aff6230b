//! Full-history aggregation of the metrics fact table.
//!
//! Aggregates are always recomputed from every stored sample; nothing is carried
//! over between runs except the samples themselves.

use crate::metrics::error::MetricsError;
use crate::types::zone::ZoneLayerKind;
use polars::prelude::*;

/// What the history is grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKey {
    Station,
    Zone(ZoneLayerKind),
}

impl AggregateKey {
    /// History column holding the entity id for this key.
    pub fn column(&self) -> &'static str {
        match self {
            AggregateKey::Station => "station_id",
            AggregateKey::Zone(kind) => kind.column_name(),
        }
    }
}

/// Average counts of one entity for one day/hour bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateRow {
    pub entity_id: i64,
    pub day_of_week: u32,
    pub hour_of_day: u32,
    pub mechanical_avg: f64,
    pub ebike_avg: f64,
}

/// Builds the aggregation plan for `key` over the raw history frame.
pub fn aggregate(history: LazyFrame, key: AggregateKey) -> LazyFrame {
    match key {
        AggregateKey::Station => station_aggregates(history),
        AggregateKey::Zone(kind) => zone_aggregates(history, kind.column_name()),
    }
}

/// Mean counts per (station, day, hour).
fn station_aggregates(history: LazyFrame) -> LazyFrame {
    history
        .group_by([col("station_id"), col("day"), col("time_hr")])
        .agg([
            col("mechanical_count")
                .cast(DataType::Float64)
                .mean()
                .alias("mechanical_avg"),
            col("ebike_count")
                .cast(DataType::Float64)
                .mean()
                .alias("ebike_avg"),
        ])
        .sort_by_exprs(
            [col("station_id"), col("day"), col("time_hr")],
            SortMultipleOptions::default(),
        )
}

/// Counts are first summed over all stations of a zone within one run, then the
/// per-run sums are averaged per (zone, day, hour). Samples without a zone id
/// for this layer are skipped.
fn zone_aggregates(history: LazyFrame, zone_column: &'static str) -> LazyFrame {
    history
        .filter(col(zone_column).is_not_null())
        .group_by([col(zone_column), col("timestamp"), col("day"), col("time_hr")])
        .agg([
            col("mechanical_count").sum().alias("mechanical_sum"),
            col("ebike_count").sum().alias("ebike_sum"),
        ])
        .group_by([col(zone_column), col("day"), col("time_hr")])
        .agg([
            col("mechanical_sum")
                .cast(DataType::Float64)
                .mean()
                .alias("mechanical_avg"),
            col("ebike_sum")
                .cast(DataType::Float64)
                .mean()
                .alias("ebike_avg"),
        ])
        .sort_by_exprs(
            [col(zone_column), col("day"), col("time_hr")],
            SortMultipleOptions::default(),
        )
}

/// Runs the plan for `key` over an already loaded history. The frame is shared,
/// so one history load serves every key of a run.
pub fn aggregate_rows(
    history: &DataFrame,
    key: AggregateKey,
) -> Result<Vec<AggregateRow>, MetricsError> {
    let frame = aggregate(history.clone().lazy(), key).collect()?;
    collect_rows(&frame, key)
}

/// Reads a collected aggregate frame into rows.
pub fn collect_rows(frame: &DataFrame, key: AggregateKey) -> Result<Vec<AggregateRow>, MetricsError> {
    let ids = frame.column(key.column())?.i64()?;
    let days = frame.column("day")?.i64()?;
    let hours = frame.column("time_hr")?.i64()?;
    let mechanical = frame.column("mechanical_avg")?.f64()?;
    let ebike = frame.column("ebike_avg")?.f64()?;

    let unexpected = |column: &str, row: usize| MetricsError::UnexpectedData {
        column: column.to_string(),
        row,
    };

    (0..frame.height())
        .map(|row| {
            let entity_id = ids.get(row).ok_or_else(|| unexpected(key.column(), row))?;
            let day_of_week = days
                .get(row)
                .and_then(|d| u32::try_from(d).ok())
                .ok_or_else(|| unexpected("day", row))?;
            let hour_of_day = hours
                .get(row)
                .and_then(|h| u32::try_from(h).ok())
                .ok_or_else(|| unexpected("time_hr", row))?;
            Ok(AggregateRow {
                entity_id,
                day_of_week,
                hour_of_day,
                mechanical_avg: mechanical.get(row).unwrap_or(0.0),
                ebike_avg: ebike.get(row).unwrap_or(0.0),
            })
        })
        .collect()
}
