use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::IntervalUnit;
use crate::core::primitives::{datetime_to_key, decimal_to_f64};
use crate::error::StockResult;

/// One keyed row of a table or storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub key: f64,
    pub values: Vec<f64>,
}

impl TableRow {
    #[must_use]
    pub fn new(key: f64, values: Vec<f64>) -> Self {
        Self { key, values }
    }

    pub fn from_decimal_values(time: DateTime<Utc>, values: &[Decimal]) -> StockResult<Self> {
        let values = values
            .iter()
            .enumerate()
            .map(|(column, value)| decimal_to_f64(*value, &format!("column {column}")))
            .collect::<StockResult<Vec<_>>>()?;
        Ok(Self {
            key: datetime_to_key(time),
            values,
        })
    }

    /// Returns the column value, `NaN` when the column is absent.
    #[must_use]
    pub fn value(&self, column: usize) -> f64 {
        self.values.get(column).copied().unwrap_or(f64::NAN)
    }
}

/// How a key lookup resolves a miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMode {
    #[default]
    Exact,
    ExactOrPrev,
    ExactOrNext,
    Nearest,
}

/// Serializable unit/count pair describing a grouping level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntervalLevel {
    pub unit: IntervalUnit,
    #[serde(default = "default_level_count")]
    pub count: u32,
}

impl IntervalLevel {
    #[must_use]
    pub fn new(unit: IntervalUnit, count: u32) -> Self {
        Self { unit, count }
    }
}

fn default_level_count() -> u32 {
    1
}
