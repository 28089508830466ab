use std::ops::RangeInclusive;

use crate::core::{Interval, SearchMode, TableRow};

/// Immutable, key-sorted snapshot of a table at one resolution.
///
/// The main storage carries the raw rows (`interval() == None`); aggregated
/// storages carry one row per interval bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct TableStorage {
    interval: Option<Interval>,
    rows: Vec<TableRow>,
    keys: Vec<f64>,
    columns_count: usize,
}

/// Window of a storage resolved for a key range.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageSelection {
    pub start_key: f64,
    pub end_key: f64,
    pub pre_first_index: Option<usize>,
    pub first_index: Option<usize>,
    pub last_index: Option<usize>,
    pub post_last_index: Option<usize>,
    mins: Vec<f64>,
    maxs: Vec<f64>,
}

impl StorageSelection {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first_index.is_none()
    }

    #[must_use]
    pub fn visible_range(&self) -> Option<RangeInclusive<usize>> {
        Some(self.first_index?..=self.last_index?)
    }

    /// Column minimum over visible rows and sentinels, `NaN` when unknown.
    #[must_use]
    pub fn min(&self, column: usize) -> f64 {
        self.mins.get(column).copied().unwrap_or(f64::NAN)
    }

    #[must_use]
    pub fn max(&self, column: usize) -> f64 {
        self.maxs.get(column).copied().unwrap_or(f64::NAN)
    }
}

impl TableStorage {
    #[must_use]
    pub fn new(interval: Option<Interval>, rows: Vec<TableRow>, columns_count: usize) -> Self {
        let keys = rows.iter().map(|row| row.key).collect();
        Self {
            interval,
            rows,
            keys,
            columns_count,
        }
    }

    #[must_use]
    pub fn interval(&self) -> Option<Interval> {
        self.interval
    }

    #[must_use]
    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    #[must_use]
    pub fn row(&self, index: usize) -> Option<&TableRow> {
        self.rows.get(index)
    }

    #[must_use]
    pub fn rows_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn keys(&self) -> &[f64] {
        &self.keys
    }

    #[must_use]
    pub fn columns_count(&self) -> usize {
        self.columns_count
    }

    /// Finds a row index for `key`; `Nearest` ties resolve to the later row.
    #[must_use]
    pub fn search_index(&self, key: f64, mode: SearchMode) -> Option<usize> {
        if key.is_nan() {
            return None;
        }
        let len = self.keys.len();
        let index = self.keys.partition_point(|probe| *probe < key);
        if index < len && self.keys[index] == key {
            return Some(index);
        }
        match mode {
            SearchMode::Exact => None,
            SearchMode::ExactOrNext => (index < len).then_some(index),
            SearchMode::ExactOrPrev => index.checked_sub(1),
            SearchMode::Nearest => {
                if len == 0 {
                    None
                } else if index == 0 {
                    Some(0)
                } else if index == len {
                    Some(len - 1)
                } else if key - self.keys[index - 1] < self.keys[index] - key {
                    Some(index - 1)
                } else {
                    Some(index)
                }
            }
        }
    }

    /// Resolves `[start_key, end_key]` by binary search.
    #[must_use]
    pub fn select(&self, start_key: f64, end_key: f64) -> StorageSelection {
        let (start_key, end_key) = ordered(start_key, end_key);
        let len = self.keys.len();
        if len == 0 || start_key.is_nan() || end_key.is_nan() {
            return self.empty_selection(start_key, end_key);
        }
        let lower = self.keys.partition_point(|key| *key < start_key);
        let upper = self.keys.partition_point(|key| *key <= end_key);
        let (first_index, last_index) = if lower < upper {
            (Some(lower), Some(upper - 1))
        } else {
            (None, None)
        };
        self.build_selection(
            start_key,
            end_key,
            lower.checked_sub(1),
            first_index,
            last_index,
            (upper < len).then_some(upper),
        )
    }

    /// Resolves a window from sentinel indexes computed by a synchronized registry.
    #[must_use]
    pub fn select_fast(
        &self,
        start_key: f64,
        end_key: f64,
        pre_first_index: Option<usize>,
        post_last_index: Option<usize>,
    ) -> StorageSelection {
        let len = self.keys.len();
        if len == 0 {
            return self.empty_selection(start_key, end_key);
        }
        let pre_first_index = pre_first_index.filter(|index| *index < len);
        let post_last_index = post_last_index.filter(|index| *index < len);
        let (first_index, last_index) = match (pre_first_index, post_last_index) {
            (None, None) => (Some(0), Some(len - 1)),
            (None, Some(0)) => (None, None),
            (None, Some(post_last)) => (Some(0), Some(post_last - 1)),
            (Some(pre_first), None) if pre_first == len - 1 => (None, None),
            (Some(pre_first), None) => (Some(pre_first + 1), Some(len - 1)),
            (Some(pre_first), Some(post_last)) if post_last <= pre_first + 1 => (None, None),
            (Some(pre_first), Some(post_last)) => (Some(pre_first + 1), Some(post_last - 1)),
        };
        self.build_selection(
            start_key,
            end_key,
            pre_first_index,
            first_index,
            last_index,
            post_last_index,
        )
    }

    #[must_use]
    pub fn select_all(&self) -> StorageSelection {
        match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => self.select_fast(*first, *last, None, None),
            _ => self.empty_selection(f64::NAN, f64::NAN),
        }
    }

    fn empty_selection(&self, start_key: f64, end_key: f64) -> StorageSelection {
        StorageSelection {
            start_key,
            end_key,
            pre_first_index: None,
            first_index: None,
            last_index: None,
            post_last_index: None,
            mins: vec![f64::NAN; self.columns_count],
            maxs: vec![f64::NAN; self.columns_count],
        }
    }

    fn build_selection(
        &self,
        start_key: f64,
        end_key: f64,
        pre_first_index: Option<usize>,
        first_index: Option<usize>,
        last_index: Option<usize>,
        post_last_index: Option<usize>,
    ) -> StorageSelection {
        let mut mins = vec![f64::INFINITY; self.columns_count];
        let mut maxs = vec![f64::NEG_INFINITY; self.columns_count];
        let from = pre_first_index.or(first_index).or(post_last_index);
        let to = post_last_index.or(last_index).or(pre_first_index);
        if let (Some(from), Some(to)) = (from, to) {
            for row in &self.rows[from..=to] {
                for (column, value) in row.values.iter().enumerate().take(self.columns_count) {
                    mins[column] = mins[column].min(*value);
                    maxs[column] = maxs[column].max(*value);
                }
            }
        }
        for value in mins.iter_mut().chain(maxs.iter_mut()) {
            if value.is_infinite() {
                *value = f64::NAN;
            }
        }
        StorageSelection {
            start_key,
            end_key,
            pre_first_index,
            first_index,
            last_index,
            post_last_index,
            mins,
            maxs,
        }
    }
}

fn ordered(start: f64, end: f64) -> (f64, f64) {
    if start > end { (end, start) } else { (start, end) }
}
