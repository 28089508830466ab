use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::rc::Rc;

use ordered_float::OrderedFloat;
use smallvec::SmallVec;
use tracing::debug;

use crate::data::TableStorage;

/// Resolved window of a registry for a key range.
///
/// `start_index`/`end_index` are fractional positions of the requested keys
/// and may lie outside the data. Integer indexes only point at existing keys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection {
    pub start_key: f64,
    pub end_key: f64,
    pub start_index: f64,
    pub end_index: f64,
    pub first_index: Option<usize>,
    pub last_index: Option<usize>,
    pub pre_first_index: Option<usize>,
    pub post_last_index: Option<usize>,
    pub min_distance: Option<f64>,
}

impl Selection {
    #[must_use]
    pub fn empty(start_key: f64, end_key: f64) -> Self {
        Self {
            start_key,
            end_key,
            start_index: f64::NAN,
            end_index: f64::NAN,
            first_index: None,
            last_index: None,
            pre_first_index: None,
            post_last_index: None,
            min_distance: None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first_index.is_none()
    }

    #[must_use]
    pub fn visible_count(&self) -> usize {
        match (self.first_index, self.last_index) {
            (Some(first), Some(last)) => last + 1 - first,
            _ => 0,
        }
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::empty(f64::NAN, f64::NAN)
    }
}

/// Data range plus a half-step margin on both sides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundaries {
    pub first_key: f64,
    pub last_key: f64,
    pub aligned_first_key: f64,
    pub aligned_last_key: f64,
}

/// Merged key index over the storages of every table in a chart.
#[derive(Debug, Clone)]
pub struct Registry {
    sources: Vec<Rc<TableStorage>>,
    keys: Vec<f64>,
    dirty: bool,
    sync_mode: bool,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            keys: Vec::new(),
            dirty: true,
            sync_mode: true,
        }
    }

    pub fn reset_sources(&mut self) {
        self.sources.clear();
        self.dirty = true;
    }

    pub fn add_source(&mut self, storage: Rc<TableStorage>) {
        self.sources.push(storage);
        self.dirty = true;
    }

    pub fn set_dirty(&mut self) {
        self.dirty = true;
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn sources_count(&self) -> usize {
        self.sources.len()
    }

    /// Rebuilds the key index when dirty; returns whether a rebuild happened.
    pub fn update(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        let mut cursors: SmallVec<[usize; 8]> = SmallVec::from_elem(0, self.sources.len());
        let mut heap = BinaryHeap::with_capacity(self.sources.len());
        for (source, storage) in self.sources.iter().enumerate() {
            if let Some(key) = storage.keys().first() {
                heap.push(Reverse((OrderedFloat(*key), source)));
            }
        }

        let largest = self
            .sources
            .iter()
            .map(|storage| storage.rows_count())
            .max()
            .unwrap_or(0);
        let mut keys = Vec::with_capacity(largest);
        while let Some(Reverse((OrderedFloat(key), source))) = heap.pop() {
            if keys.last().is_none_or(|last| *last < key) {
                keys.push(key);
            }
            cursors[source] += 1;
            if let Some(next) = self.sources[source].keys().get(cursors[source]) {
                heap.push(Reverse((OrderedFloat(*next), source)));
            }
        }

        self.sync_mode = self
            .sources
            .iter()
            .all(|storage| storage.rows_count() == keys.len());
        self.keys = keys;
        self.dirty = false;
        debug!(
            sources = self.sources.len(),
            keys_count = self.keys.len(),
            sync_mode = self.sync_mode,
            "registry rebuilt"
        );
        true
    }

    /// `true` when every source shares the merged index layout.
    #[must_use]
    pub fn is_in_sync_mode(&self) -> bool {
        self.sync_mode
    }

    #[must_use]
    pub fn keys(&self) -> &[f64] {
        &self.keys
    }

    #[must_use]
    pub fn keys_count(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn first_key(&self) -> f64 {
        self.keys.first().copied().unwrap_or(f64::NAN)
    }

    #[must_use]
    pub fn last_key(&self) -> f64 {
        self.keys.last().copied().unwrap_or(f64::NAN)
    }

    #[must_use]
    pub fn first_index(&self) -> Option<usize> {
        (!self.keys.is_empty()).then_some(0)
    }

    #[must_use]
    pub fn last_index(&self) -> Option<usize> {
        self.keys.len().checked_sub(1)
    }

    /// Maps a (possibly fractional or out-of-range) index to a key.
    #[must_use]
    pub fn key_by_index(&self, index: f64) -> f64 {
        let len = self.keys.len();
        if index.is_nan() || len == 0 {
            return f64::NAN;
        }
        if len == 1 {
            return self.keys[0] + index;
        }
        let last = (len - 1) as f64;
        if index < 0.0 {
            return self.keys[0] + index * (self.keys[1] - self.keys[0]);
        }
        if index > last {
            let step = self.keys[len - 1] - self.keys[len - 2];
            return self.keys[len - 1] + (index - last) * step;
        }
        let lower = index.floor();
        let position = lower as usize;
        let fraction = index - lower;
        if fraction == 0.0 || position + 1 >= len {
            return self.keys[position];
        }
        self.keys[position] + fraction * (self.keys[position + 1] - self.keys[position])
    }

    /// Inverse of [`Registry::key_by_index`].
    #[must_use]
    pub fn index_by_key(&self, key: f64) -> f64 {
        let len = self.keys.len();
        if key.is_nan() || len == 0 {
            return f64::NAN;
        }
        if len == 1 {
            return key - self.keys[0];
        }
        let position = self.keys.partition_point(|probe| *probe < key);
        if position < len && self.keys[position] == key {
            return position as f64;
        }
        let lower = if position == 0 {
            0
        } else if position == len {
            len - 2
        } else {
            position - 1
        };
        let step = self.keys[lower + 1] - self.keys[lower];
        lower as f64 + (key - self.keys[lower]) / step
    }

    /// Snaps `key` to the nearest registry key.
    #[must_use]
    pub fn align_key(&self, key: f64) -> f64 {
        let index = self.index_by_key(key);
        if index.is_nan() {
            return f64::NAN;
        }
        let last = (self.keys.len() - 1) as f64;
        self.keys[index.round().clamp(0.0, last) as usize]
    }

    /// Resolves `[start_key, end_key]` without mutating the registry.
    #[must_use]
    pub fn selection(&self, start_key: f64, end_key: f64) -> Selection {
        let (start_key, end_key) = if start_key > end_key {
            (end_key, start_key)
        } else {
            (start_key, end_key)
        };
        let len = self.keys.len();
        if len == 0 || start_key.is_nan() || end_key.is_nan() {
            return Selection::empty(start_key, end_key);
        }

        let lower = self.keys.partition_point(|key| *key < start_key);
        let upper = self.keys.partition_point(|key| *key <= end_key);
        let (first_index, last_index) = if lower < upper {
            (Some(lower), Some(upper - 1))
        } else {
            (None, None)
        };
        let pre_first_index = lower.checked_sub(1);
        let post_last_index = (upper < len).then_some(upper);

        let from = pre_first_index.or(first_index).or(post_last_index);
        let to = post_last_index.or(last_index).or(pre_first_index);
        let min_distance = match (from, to) {
            (Some(from), Some(to)) if to > from => self.keys[from..=to]
                .windows(2)
                .map(|pair| pair[1] - pair[0])
                .min_by(f64::total_cmp),
            _ => None,
        };

        Selection {
            start_key,
            end_key,
            start_index: self.index_by_key(start_key),
            end_index: self.index_by_key(end_key),
            first_index,
            last_index,
            pre_first_index,
            post_last_index,
            min_distance,
        }
    }

    #[must_use]
    pub fn boundaries(&self) -> Boundaries {
        let len = self.keys.len();
        let first_key = self.first_key();
        let last_key = self.last_key();
        let (aligned_first_key, aligned_last_key) = match len {
            0 => (f64::NAN, f64::NAN),
            1 => (first_key - 1.0, last_key + 1.0),
            _ => (
                first_key - (self.keys[1] - first_key) / 2.0,
                last_key + (last_key - self.keys[len - 2]) / 2.0,
            ),
        };
        Boundaries {
            first_key,
            last_key,
            aligned_first_key,
            aligned_last_key,
        }
    }

    /// Iterates `[first, last]` when sources share the index layout.
    #[must_use]
    pub fn iter_fast(&self, first: usize, last: usize) -> Option<RegistryIter<'_>> {
        self.sync_mode.then(|| self.iter_range(first, last))
    }

    /// Iterates `[first, last]`, clamped to existing keys.
    #[must_use]
    pub fn iter_range(&self, first: usize, last: usize) -> RegistryIter<'_> {
        let end = last.saturating_add(1).min(self.keys.len());
        RegistryIter {
            keys: &self.keys,
            next: first.min(end),
            end,
        }
    }
}

/// Walks registry keys as `(index, key)` pairs.
#[derive(Debug, Clone)]
pub struct RegistryIter<'a> {
    keys: &'a [f64],
    next: usize,
    end: usize,
}

impl Iterator for RegistryIter<'_> {
    type Item = (usize, f64);

    fn next(&mut self) -> Option<(usize, f64)> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some((index, self.keys[index]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RegistryIter<'_> {}
