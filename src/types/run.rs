//! The batch run clock and the fact rows it stamps.

use chrono::{Datelike, Local, NaiveDateTime, Timelike};

/// One discrete execution of the pipeline. Every sample ingested during the run
/// shares this timestamp and its day/hour bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRun {
    pub timestamp: NaiveDateTime,
    /// Monday = 0 .. Sunday = 6.
    pub day_of_week: u32,
    /// 0..=23.
    pub hour_of_day: u32,
}

impl BatchRun {
    /// Captures the local wall clock.
    pub fn now() -> Self {
        Self::at(Local::now().naive_local())
    }

    pub fn at(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            day_of_week: timestamp.weekday().num_days_from_monday(),
            hour_of_day: timestamp.hour(),
        }
    }

    /// Key under which the run's rows are stored and grouped.
    pub fn timestamp_key(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}

/// One row of the metrics fact table.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub station_id: i64,
    pub neighbourhood_id: Option<i64>,
    pub arrondissement_id: Option<i64>,
    pub commune_id: Option<i64>,
    pub timestamp: String,
    pub day_of_week: u32,
    pub hour_of_day: u32,
    pub mechanical_count: u32,
    pub ebike_count: u32,
}
