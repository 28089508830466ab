use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::core::{Interval, TableRow};
use crate::data::aggregation::{Aggregation, aggregate_rows};
use crate::data::storage::TableStorage;
use crate::error::{StockError, StockResult};

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receives data-changed notifications from tables.
///
/// Implementations must not mutate the notifying table from inside the
/// callback.
pub trait TableObserver {
    fn table_changed(&self, table: TableId);
}

/// Shared handle to a keyed, column-oriented data table.
///
/// Cloning the handle is cheap and clones share rows, caches and
/// subscriptions. Identity is exposed through [`Table::id`].
#[derive(Clone)]
pub struct Table {
    inner: Rc<TableInner>,
}

struct TableInner {
    id: TableId,
    columns: Vec<Aggregation>,
    state: RefCell<TableState>,
}

#[derive(Default)]
struct TableState {
    rows: Vec<TableRow>,
    main: Option<Rc<TableStorage>>,
    aggregates: HashMap<Interval, Rc<TableStorage>>,
    observers: Vec<(SubscriptionId, Weak<dyn TableObserver>)>,
    transaction: Option<Transaction>,
}

struct Transaction {
    depth: usize,
    snapshot: Vec<TableRow>,
    changed: bool,
}

impl TableState {
    fn drop_caches(&mut self) {
        self.main = None;
        self.aggregates.clear();
    }
}

impl Table {
    /// Creates a table whose columns group with the given aggregations.
    #[must_use]
    pub fn new(columns: Vec<Aggregation>) -> Self {
        Self {
            inner: Rc::new(TableInner {
                id: TableId(NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed)),
                columns,
                state: RefCell::new(TableState::default()),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> TableId {
        self.inner.id
    }

    #[must_use]
    pub fn columns(&self) -> &[Aggregation] {
        &self.inner.columns
    }

    #[must_use]
    pub fn columns_count(&self) -> usize {
        self.inner.columns.len()
    }

    #[must_use]
    pub fn rows_count(&self) -> usize {
        self.inner.state.borrow().rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows_count() == 0
    }

    /// Merges rows by key. Equal keys replace existing rows.
    ///
    /// Rows with non-finite keys are dropped; a row with the wrong number of
    /// values rejects the whole batch. Returns the number of accepted rows.
    pub fn add_rows(&self, rows: impl IntoIterator<Item = TableRow>) -> StockResult<usize> {
        let columns_count = self.columns_count();
        let mut incoming = Vec::new();
        let mut dropped = 0_usize;
        for row in rows {
            if row.values.len() != columns_count {
                return Err(StockError::InvalidData(format!(
                    "row at key {} has {} values, table has {columns_count} columns",
                    row.key,
                    row.values.len()
                )));
            }
            if row.key.is_finite() {
                incoming.push(row);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            warn!(table = self.id().0, dropped, "rows with non-finite keys dropped");
        }
        if incoming.is_empty() {
            return Ok(0);
        }

        incoming.sort_by(|left, right| left.key.total_cmp(&right.key));
        let accepted = incoming.len();
        self.mutate(|rows| {
            for row in incoming {
                if rows.last().is_none_or(|last| last.key < row.key) {
                    rows.push(row);
                    continue;
                }
                match rows.binary_search_by(|probe| probe.key.total_cmp(&row.key)) {
                    Ok(index) => rows[index] = row,
                    Err(index) => rows.insert(index, row),
                }
            }
            true
        });
        debug!(table = self.id().0, accepted, rows_count = self.rows_count(), "rows added");
        Ok(accepted)
    }

    pub fn add_decimal_row(&self, time: DateTime<Utc>, values: &[Decimal]) -> StockResult<usize> {
        let row = TableRow::from_decimal_values(time, values)?;
        self.add_rows([row])
    }

    /// Removes rows with keys in `[start_key, end_key]`.
    pub fn remove(&self, start_key: f64, end_key: f64) -> usize {
        let (start_key, end_key) = if start_key > end_key {
            (end_key, start_key)
        } else {
            (start_key, end_key)
        };
        let mut removed = 0;
        self.mutate(|rows| {
            let from = rows.partition_point(|row| row.key < start_key);
            let to = rows.partition_point(|row| row.key <= end_key);
            removed = to.saturating_sub(from);
            if removed > 0 {
                rows.drain(from..to);
            }
            removed > 0
        });
        if removed > 0 {
            debug!(table = self.id().0, removed, "rows removed");
        }
        removed
    }

    pub fn remove_first(&self, count: usize) -> usize {
        let mut removed = 0;
        self.mutate(|rows| {
            removed = count.min(rows.len());
            rows.drain(..removed);
            removed > 0
        });
        removed
    }

    pub fn clear(&self) {
        self.mutate(|rows| {
            let changed = !rows.is_empty();
            rows.clear();
            changed
        });
    }

    /// Defers notifications until the outermost [`Table::commit`].
    pub fn start_transaction(&self) {
        let mut state = self.inner.state.borrow_mut();
        match state.transaction.as_mut() {
            Some(transaction) => transaction.depth += 1,
            None => {
                let snapshot = state.rows.clone();
                state.transaction = Some(Transaction {
                    depth: 1,
                    snapshot,
                    changed: false,
                });
            }
        }
    }

    /// Closes one transaction level; returns `true` when observers were notified.
    pub fn commit(&self) -> bool {
        let notify = {
            let mut state = self.inner.state.borrow_mut();
            let Some(transaction) = state.transaction.as_mut() else {
                return false;
            };
            transaction.depth -= 1;
            if transaction.depth > 0 {
                return false;
            }
            let changed = transaction.changed;
            state.transaction = None;
            changed
        };
        if notify {
            self.notify();
        }
        notify
    }

    /// Discards every change made since the outermost `start_transaction`.
    pub fn rollback(&self) -> bool {
        let mut state = self.inner.state.borrow_mut();
        let Some(transaction) = state.transaction.take() else {
            return false;
        };
        if transaction.changed {
            state.rows = transaction.snapshot;
            state.drop_caches();
        }
        debug!(table = self.id().0, "transaction rolled back");
        true
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.inner.state.borrow().transaction.is_some()
    }

    /// Returns the main storage (`None`) or the aggregate for `interval`.
    ///
    /// Storages are snapshots. They are rebuilt lazily after a mutation, so
    /// `Rc::ptr_eq` on two results tells whether the data changed in between.
    #[must_use]
    pub fn storage(&self, interval: Option<Interval>) -> Rc<TableStorage> {
        let mut state = self.inner.state.borrow_mut();
        let columns_count = self.inner.columns.len();
        let main = match &state.main {
            Some(main) => Rc::clone(main),
            None => {
                let main = Rc::new(TableStorage::new(None, state.rows.clone(), columns_count));
                state.main = Some(Rc::clone(&main));
                main
            }
        };
        let Some(interval) = interval else {
            return main;
        };
        if let Some(aggregate) = state.aggregates.get(&interval) {
            return Rc::clone(aggregate);
        }
        let rows = aggregate_rows(main.rows(), &self.inner.columns, interval);
        debug!(
            table = self.id().0,
            interval = %interval,
            source_rows = main.rows_count(),
            grouped_rows = rows.len(),
            "aggregated storage built"
        );
        let aggregate = Rc::new(TableStorage::new(Some(interval), rows, columns_count));
        state.aggregates.insert(interval, Rc::clone(&aggregate));
        aggregate
    }

    pub fn subscribe(&self, observer: Weak<dyn TableObserver>) -> SubscriptionId {
        let id = SubscriptionId(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed));
        self.inner.state.borrow_mut().observers.push((id, observer));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut state = self.inner.state.borrow_mut();
        let before = state.observers.len();
        state.observers.retain(|(subscription, _)| *subscription != id);
        state.observers.len() != before
    }

    #[must_use]
    pub fn observers_count(&self) -> usize {
        self.inner
            .state
            .borrow()
            .observers
            .iter()
            .filter(|(_, observer)| observer.strong_count() > 0)
            .count()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Table) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn mutate(&self, apply: impl FnOnce(&mut Vec<TableRow>) -> bool) {
        let notify = {
            let mut state = self.inner.state.borrow_mut();
            if !apply(&mut state.rows) {
                return;
            }
            state.drop_caches();
            match state.transaction.as_mut() {
                Some(transaction) => {
                    transaction.changed = true;
                    false
                }
                None => true,
            }
        };
        if notify {
            self.notify();
        }
    }

    fn notify(&self) {
        let observers: Vec<Rc<dyn TableObserver>> = {
            let mut state = self.inner.state.borrow_mut();
            state
                .observers
                .retain(|(_, observer)| observer.strong_count() > 0);
            state
                .observers
                .iter()
                .filter_map(|(_, observer)| observer.upgrade())
                .collect()
        };
        for observer in observers {
            observer.table_changed(self.id());
        }
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("id", &self.inner.id)
            .field("columns", &self.inner.columns)
            .field("rows_count", &self.rows_count())
            .finish()
    }
}
