use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::{StockError, StockResult};

pub fn decimal_to_f64(value: Decimal, field_name: &str) -> StockResult<f64> {
    value.to_f64().ok_or_else(|| {
        StockError::InvalidData(format!("{field_name} cannot be represented as f64"))
    })
}

/// Table keys are UTC milliseconds since the Unix epoch.
#[must_use]
pub fn datetime_to_key(time: DateTime<Utc>) -> f64 {
    time.timestamp_millis() as f64
}

#[must_use]
pub fn key_to_datetime(key: f64) -> Option<DateTime<Utc>> {
    if !key.is_finite() {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(key.round() as i64)
}
