use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::core::{Interval, SearchMode, TableRow};
use crate::data::mapping::TableMapping;
use crate::data::storage::{StorageSelection, TableStorage};
use crate::error::StockResult;
use crate::stock::{ControllerId, Selection};

static NEXT_SELECTABLE_ID: AtomicU64 = AtomicU64::new(1);

pub type SharedSelectable = Rc<RefCell<TableSelectable>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SelectableId(u64);

/// Selection pushed by a controller to its sources.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionUpdate {
    /// The registry index layout matches every storage, reuse its sentinels.
    Fast {
        selection: Selection,
        interval: Option<Interval>,
    },
    /// Sources must resolve the key range against their own storage.
    Mapped {
        start_key: f64,
        end_key: f64,
        interval: Option<Interval>,
    },
}

/// Borrowed row of the selected storage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowView<'a> {
    pub key: f64,
    pub index: usize,
    pub values: &'a [f64],
}

impl RowView<'_> {
    #[must_use]
    pub fn value(&self, column: usize) -> f64 {
        self.values.get(column).copied().unwrap_or(f64::NAN)
    }

    #[must_use]
    pub fn to_row(&self) -> TableRow {
        TableRow::new(self.key, self.values.to_vec())
    }
}

/// Iterator over the visible rows of a [`TableSelectable`].
#[derive(Debug, Clone)]
pub struct RowIter<'a> {
    storage: Option<&'a TableStorage>,
    next: usize,
    end: usize,
}

impl<'a> Iterator for RowIter<'a> {
    type Item = RowView<'a>;

    fn next(&mut self) -> Option<RowView<'a>> {
        let storage = self.storage?;
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;
        storage.row(index).map(|row| row_view(row, index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RowIter<'_> {}

/// Series-facing window over one table mapping.
#[derive(Debug)]
pub struct TableSelectable {
    id: SelectableId,
    mapping: TableMapping,
    controller: Option<ControllerId>,
    storage: Option<Rc<TableStorage>>,
    interval: Option<Interval>,
    selection: Option<StorageSelection>,
    valid: bool,
}

impl TableSelectable {
    #[must_use]
    pub fn new(mapping: TableMapping) -> Self {
        Self {
            id: SelectableId(NEXT_SELECTABLE_ID.fetch_add(1, Ordering::Relaxed)),
            mapping,
            controller: None,
            storage: None,
            interval: None,
            selection: None,
            valid: false,
        }
    }

    #[must_use]
    pub fn shared(mapping: TableMapping) -> SharedSelectable {
        Rc::new(RefCell::new(Self::new(mapping)))
    }

    #[must_use]
    pub fn id(&self) -> SelectableId {
        self.id
    }

    #[must_use]
    pub fn mapping(&self) -> &TableMapping {
        &self.mapping
    }

    #[must_use]
    pub fn controller(&self) -> Option<ControllerId> {
        self.controller
    }

    pub fn set_controller(&mut self, controller: Option<ControllerId>) {
        self.controller = controller;
    }

    #[must_use]
    pub fn interval(&self) -> Option<Interval> {
        self.interval
    }

    #[must_use]
    pub fn is_aggregated(&self) -> bool {
        self.interval.is_some()
    }

    #[must_use]
    pub fn selection(&self) -> Option<&StorageSelection> {
        self.selection.as_ref()
    }

    /// Forces the next select call to reacquire the storage.
    pub fn invalidate_selection(&mut self) {
        self.valid = false;
    }

    /// Applies a controller update; returns `true` when the window was recomputed.
    pub fn apply_selection(&mut self, update: SelectionUpdate) -> bool {
        match update {
            SelectionUpdate::Fast {
                selection,
                interval,
            } => self.select_fast(selection.start_key, selection.end_key, &selection, interval),
            SelectionUpdate::Mapped {
                start_key,
                end_key,
                interval,
            } => self.select_internal(start_key, end_key, interval),
        }
    }

    pub fn select_internal(
        &mut self,
        start_key: f64,
        end_key: f64,
        interval: Option<Interval>,
    ) -> bool {
        let storage = self.mapping.table().storage(interval);
        if self.is_current(&storage, start_key, end_key) {
            return false;
        }
        let selection = storage.select(start_key, end_key);
        self.store(storage, interval, selection);
        true
    }

    pub fn select_fast(
        &mut self,
        start_key: f64,
        end_key: f64,
        selection: &Selection,
        interval: Option<Interval>,
    ) -> bool {
        let storage = self.mapping.table().storage(interval);
        if self.is_current(&storage, start_key, end_key) {
            return false;
        }
        let selection = storage.select_fast(
            start_key,
            end_key,
            selection.pre_first_index,
            selection.post_last_index,
        );
        self.store(storage, interval, selection);
        true
    }

    /// Standalone selection for series that are not driven by a controller.
    pub fn select(&mut self, start_key: f64, end_key: f64, interval: Option<Interval>) -> bool {
        self.select_internal(start_key, end_key, interval)
    }

    pub fn select_all(&mut self, interval: Option<Interval>) -> bool {
        let storage = self.mapping.table().storage(interval);
        let selection = storage.select_all();
        let (start_key, end_key) = (selection.start_key, selection.end_key);
        if self.is_current(&storage, start_key, end_key) {
            return false;
        }
        self.store(storage, interval, selection);
        true
    }

    #[must_use]
    pub fn iter(&self) -> RowIter<'_> {
        let range = self
            .selection
            .as_ref()
            .and_then(StorageSelection::visible_range);
        match (self.storage.as_deref(), range) {
            (Some(storage), Some(range)) => RowIter {
                storage: Some(storage),
                next: *range.start(),
                end: range.end() + 1,
            },
            _ => RowIter {
                storage: None,
                next: 0,
                end: 0,
            },
        }
    }

    #[must_use]
    pub fn first_visible_row(&self) -> Option<RowView<'_>> {
        self.row_at(self.selection.as_ref()?.first_index?)
    }

    #[must_use]
    pub fn last_visible_row(&self) -> Option<RowView<'_>> {
        self.row_at(self.selection.as_ref()?.last_index?)
    }

    #[must_use]
    pub fn pre_first_row(&self) -> Option<RowView<'_>> {
        self.row_at(self.selection.as_ref()?.pre_first_index?)
    }

    #[must_use]
    pub fn post_last_row(&self) -> Option<RowView<'_>> {
        self.row_at(self.selection.as_ref()?.post_last_index?)
    }

    /// Looks `key` up in the currently selected storage.
    #[must_use]
    pub fn search(&self, key: f64, mode: SearchMode) -> Option<RowView<'_>> {
        let storage = self.storage.as_deref()?;
        let index = storage.search_index(key, mode)?;
        storage.row(index).map(|row| row_view(row, index))
    }

    /// Raw row for `key`, bypassing any grouping.
    #[must_use]
    pub fn row_from_main_storage(&self, key: f64) -> Option<TableRow> {
        let storage = self.mapping.table().storage(None);
        let index = storage.search_index(key, SearchMode::Exact)?;
        storage.row(index).cloned()
    }

    pub fn min(&self, field: &str) -> StockResult<f64> {
        let column = self.mapping.column(field)?;
        Ok(self
            .selection
            .as_ref()
            .map_or(f64::NAN, |selection| selection.min(column)))
    }

    pub fn max(&self, field: &str) -> StockResult<f64> {
        let column = self.mapping.column(field)?;
        Ok(self
            .selection
            .as_ref()
            .map_or(f64::NAN, |selection| selection.max(column)))
    }

    fn row_at(&self, index: usize) -> Option<RowView<'_>> {
        self.storage
            .as_deref()?
            .row(index)
            .map(|row| row_view(row, index))
    }

    fn is_current(&self, storage: &Rc<TableStorage>, start_key: f64, end_key: f64) -> bool {
        self.valid
            && self
                .storage
                .as_ref()
                .is_some_and(|current| Rc::ptr_eq(current, storage))
            && self.selection.as_ref().is_some_and(|selection| {
                same_key(selection.start_key, start_key) && same_key(selection.end_key, end_key)
            })
    }

    fn store(
        &mut self,
        storage: Rc<TableStorage>,
        interval: Option<Interval>,
        selection: StorageSelection,
    ) {
        trace!(
            selectable = self.id.0,
            first_index = ?selection.first_index,
            last_index = ?selection.last_index,
            aggregated = interval.is_some(),
            "selection acquired"
        );
        self.storage = Some(storage);
        self.interval = interval;
        self.selection = Some(selection);
        self.valid = true;
    }
}

fn row_view(row: &TableRow, index: usize) -> RowView<'_> {
    RowView {
        key: row.key,
        index,
        values: &row.values,
    }
}

fn same_key(left: f64, right: f64) -> bool {
    left == right || (left.is_nan() && right.is_nan())
}
