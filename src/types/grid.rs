//! Dense day-of-week by hour-of-day grids of average availability.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Extent of the output grid. Days are numbered `0..days`, hours `0..hours`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSpec {
    pub days: u32,
    pub hours: u32,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self { days: 7, hours: 24 }
    }
}

impl GridSpec {
    pub fn contains(&self, day: u32, hour: u32) -> bool {
        day < self.days && hour < self.hours
    }

    pub fn cell_count(&self) -> usize {
        (self.days * self.hours) as usize
    }
}

/// Average counts for one day/hour cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CellAverage {
    pub mechanical_avg: f64,
    pub ebike_avg: f64,
}

/// A complete grid for one station or zone. Every cell of the [`GridSpec`] is present.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AggregateGrid {
    cells: BTreeMap<u32, BTreeMap<u32, CellAverage>>,
}

impl AggregateGrid {
    pub fn zeroed(spec: GridSpec) -> Self {
        let cells = (0..spec.days)
            .map(|day| {
                let hours = (0..spec.hours)
                    .map(|hour| (hour, CellAverage::default()))
                    .collect();
                (day, hours)
            })
            .collect();
        Self { cells }
    }

    /// Overwrites a cell. Returns false, leaving the grid untouched, when the
    /// cell lies outside the grid.
    pub fn set(&mut self, day: u32, hour: u32, value: CellAverage) -> bool {
        match self.cells.get_mut(&day).and_then(|hours| hours.get_mut(&hour)) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, day: u32, hour: u32) -> Option<&CellAverage> {
        self.cells.get(&day).and_then(|hours| hours.get(&hour))
    }

    pub fn cell_count(&self) -> usize {
        self.cells.values().map(BTreeMap::len).sum()
    }

    /// `{"<day>": {"<hour>": {"mechanical_avg": .., "ebike_avg": ..}}}`
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_grid_is_complete() {
        let grid = AggregateGrid::zeroed(GridSpec::default());
        assert_eq!(grid.cell_count(), 7 * 24);
        assert_eq!(grid.get(6, 23), Some(&CellAverage::default()));
        assert_eq!(grid.get(7, 0), None);
    }

    #[test]
    fn test_set_outside_grid_is_rejected() {
        let mut grid = AggregateGrid::zeroed(GridSpec { days: 2, hours: 3 });
        let value = CellAverage {
            mechanical_avg: 1.5,
            ebike_avg: 0.5,
        };
        assert!(grid.set(1, 2, value));
        assert!(!grid.set(1, 3, value));
        assert_eq!(grid.cell_count(), 6);
        assert_eq!(grid.get(1, 2), Some(&value));
    }

    #[test]
    fn test_json_shape() {
        let mut grid = AggregateGrid::zeroed(GridSpec { days: 1, hours: 2 });
        grid.set(
            0,
            1,
            CellAverage {
                mechanical_avg: 6.0,
                ebike_avg: 4.0,
            },
        );
        assert_eq!(
            grid.to_json(),
            serde_json::json!({
                "0": {
                    "0": {"mechanical_avg": 0.0, "ebike_avg": 0.0},
                    "1": {"mechanical_avg": 6.0, "ebike_avg": 4.0}
                }
            })
        );
    }
}
