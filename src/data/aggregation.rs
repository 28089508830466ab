use serde::{Deserialize, Serialize};

use crate::core::{Interval, TableRow};

/// How the values of one column collapse into a single grouped value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Aggregation {
    First,
    #[default]
    Last,
    Min,
    Max,
    Sum,
    Average,
    Count,
}

/// Running state for one column of one bucket. `NaN` inputs are skipped.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    kind: Aggregation,
    value: f64,
    sum: f64,
    count: usize,
}

impl Aggregator {
    #[must_use]
    pub fn new(kind: Aggregation) -> Self {
        Self {
            kind,
            value: f64::NAN,
            sum: 0.0,
            count: 0,
        }
    }

    pub fn push(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.count += 1;
        self.sum += value;
        self.value = match self.kind {
            Aggregation::First if self.count > 1 => self.value,
            Aggregation::Min if self.count > 1 => self.value.min(value),
            Aggregation::Max if self.count > 1 => self.value.max(value),
            _ => value,
        };
    }

    #[must_use]
    pub fn finish(&self) -> f64 {
        match self.kind {
            Aggregation::Count => self.count as f64,
            Aggregation::Sum if self.count > 0 => self.sum,
            Aggregation::Average if self.count > 0 => self.sum / self.count as f64,
            Aggregation::Sum | Aggregation::Average => f64::NAN,
            Aggregation::First | Aggregation::Last | Aggregation::Min | Aggregation::Max => {
                self.value
            }
        }
    }
}

/// Groups key-sorted rows into `interval` buckets keyed by the bucket start.
#[must_use]
pub fn aggregate_rows(rows: &[TableRow], columns: &[Aggregation], interval: Interval) -> Vec<TableRow> {
    let mut grouped = Vec::new();
    let mut bucket_key = f64::NAN;
    let mut bucket_end = f64::NAN;
    let mut aggregators: Vec<Aggregator> = Vec::new();

    for row in rows {
        // NaN bucket_end makes the first row always open a bucket
        if !(row.key < bucket_end) {
            if !aggregators.is_empty() {
                grouped.push(finish_bucket(bucket_key, &aggregators));
            }
            bucket_key = interval.align(row.key);
            bucket_end = interval.next_boundary(bucket_key);
            aggregators = columns.iter().copied().map(Aggregator::new).collect();
        }
        for (aggregator, value) in aggregators.iter_mut().zip(&row.values) {
            aggregator.push(*value);
        }
    }
    if !aggregators.is_empty() {
        grouped.push(finish_bucket(bucket_key, &aggregators));
    }
    grouped
}

fn finish_bucket(key: f64, aggregators: &[Aggregator]) -> TableRow {
    TableRow::new(key, aggregators.iter().map(Aggregator::finish).collect())
}
