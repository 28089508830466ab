use std::cell::Cell;
use std::rc::Rc;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

use chart_stock::core::{Interval, IntervalUnit, TableRow, key_to_datetime};
use chart_stock::data::{Aggregation, Table, TableId, TableObserver};
use chart_stock::error::StockError;

#[derive(Default)]
struct Counter {
    calls: Cell<usize>,
}

impl TableObserver for Counter {
    fn table_changed(&self, _table: TableId) {
        self.calls.set(self.calls.get() + 1);
    }
}

fn keys(table: &Table) -> Vec<f64> {
    table.storage(None).keys().to_vec()
}

#[test]
fn rows_are_merged_by_key() {
    let table = Table::new(vec![Aggregation::Last]);
    let accepted = table
        .add_rows([TableRow::new(3.0, vec![30.0]), TableRow::new(1.0, vec![10.0])])
        .expect("rows accepted");
    assert_eq!(accepted, 2);

    table
        .add_rows([TableRow::new(2.0, vec![20.0]), TableRow::new(1.0, vec![11.0])])
        .expect("rows accepted");
    assert_eq!(keys(&table), vec![1.0, 2.0, 3.0]);
    assert_eq!(table.storage(None).rows()[0].value(0), 11.0);
}

#[test]
fn width_mismatch_rejects_the_batch() {
    let table = Table::new(vec![Aggregation::Last, Aggregation::Sum]);
    let err = table
        .add_rows([
            TableRow::new(1.0, vec![1.0, 2.0]),
            TableRow::new(2.0, vec![1.0]),
        ])
        .expect_err("short row must fail");
    assert!(matches!(err, StockError::InvalidData(_)));
    assert!(table.is_empty());
}

#[test]
fn non_finite_keys_are_dropped() {
    let table = Table::new(vec![Aggregation::Last]);
    let accepted = table
        .add_rows([
            TableRow::new(f64::NAN, vec![1.0]),
            TableRow::new(f64::INFINITY, vec![1.0]),
            TableRow::new(5.0, vec![1.0]),
        ])
        .expect("batch accepted");
    assert_eq!(accepted, 1);
    assert_eq!(keys(&table), vec![5.0]);
}

#[test]
fn removal_operations_report_counts() {
    let table = Table::new(vec![Aggregation::Last]);
    table
        .add_rows((0..10).map(|key| TableRow::new(f64::from(key), vec![0.0])))
        .expect("rows accepted");

    assert_eq!(table.remove(5.0, 2.0), 4);
    assert_eq!(keys(&table), vec![0.0, 1.0, 6.0, 7.0, 8.0, 9.0]);
    assert_eq!(table.remove(2.5, 4.5), 0);
    assert_eq!(table.remove_first(2), 2);
    assert_eq!(table.remove_first(100), 4);
    assert!(table.is_empty());
}

#[test]
fn observers_are_notified_on_change_only() {
    let table = Table::new(vec![Aggregation::Last]);
    let counter = Rc::new(Counter::default());
    let subscription = table.subscribe(Rc::<Counter>::downgrade(&counter));
    assert_eq!(table.observers_count(), 1);

    table
        .add_rows([TableRow::new(1.0, vec![1.0])])
        .expect("row accepted");
    assert_eq!(counter.calls.get(), 1);
    table.remove(10.0, 20.0);
    table.add_rows(Vec::new()).expect("empty batch");
    assert_eq!(counter.calls.get(), 1);
    table.clear();
    table.clear();
    assert_eq!(counter.calls.get(), 2);

    assert!(table.unsubscribe(subscription));
    assert!(!table.unsubscribe(subscription));
    table
        .add_rows([TableRow::new(1.0, vec![1.0])])
        .expect("row accepted");
    assert_eq!(counter.calls.get(), 2);
}

#[test]
fn dropped_observers_are_pruned() {
    let table = Table::new(vec![Aggregation::Last]);
    let counter = Rc::new(Counter::default());
    table.subscribe(Rc::<Counter>::downgrade(&counter));
    drop(counter);
    assert_eq!(table.observers_count(), 0);
    table
        .add_rows([TableRow::new(1.0, vec![1.0])])
        .expect("row accepted");
}

#[test]
fn nested_transactions_notify_once_on_outer_commit() {
    let table = Table::new(vec![Aggregation::Last]);
    let counter = Rc::new(Counter::default());
    table.subscribe(Rc::<Counter>::downgrade(&counter));

    table.start_transaction();
    table.start_transaction();
    table
        .add_rows([TableRow::new(1.0, vec![1.0])])
        .expect("row accepted");
    table.remove_first(1);
    table
        .add_rows([TableRow::new(2.0, vec![2.0])])
        .expect("row accepted");
    assert!(!table.commit());
    assert!(table.in_transaction());
    assert_eq!(counter.calls.get(), 0);
    assert!(table.commit());
    assert!(!table.in_transaction());
    assert_eq!(counter.calls.get(), 1);
    assert!(!table.commit());
}

#[test]
fn rollback_restores_rows_silently() {
    let table = Table::new(vec![Aggregation::Last]);
    table
        .add_rows([TableRow::new(1.0, vec![1.0])])
        .expect("row accepted");
    let counter = Rc::new(Counter::default());
    table.subscribe(Rc::<Counter>::downgrade(&counter));

    table.start_transaction();
    table
        .add_rows([TableRow::new(2.0, vec![2.0])])
        .expect("row accepted");
    assert_eq!(keys(&table), vec![1.0, 2.0]);
    assert!(table.rollback());
    assert_eq!(keys(&table), vec![1.0]);
    assert_eq!(counter.calls.get(), 0);
    assert!(!table.rollback());
}

#[test]
fn storages_are_cached_until_mutation() {
    let table = Table::new(vec![Aggregation::Sum]);
    table
        .add_rows((0..120).map(|i| TableRow::new(f64::from(i) * 1_000.0, vec![1.0])))
        .expect("rows accepted");
    let minute = Interval::new(IntervalUnit::Minute, 1).expect("valid interval");

    let main = table.storage(None);
    let grouped = table.storage(Some(minute));
    assert!(Rc::ptr_eq(&main, &table.storage(None)));
    assert!(Rc::ptr_eq(&grouped, &table.storage(Some(minute))));
    assert_eq!(grouped.interval(), Some(minute));
    assert_eq!(grouped.rows_count(), 2);

    table
        .add_rows([TableRow::new(120_000.0, vec![1.0])])
        .expect("row accepted");
    assert!(!Rc::ptr_eq(&main, &table.storage(None)));
    let rebuilt = table.storage(Some(minute));
    assert!(!Rc::ptr_eq(&grouped, &rebuilt));
    assert_eq!(rebuilt.rows_count(), 3);
}

#[test]
fn grouped_storage_collapses_columns() {
    let table = Table::new(vec![
        Aggregation::First,
        Aggregation::Max,
        Aggregation::Min,
        Aggregation::Last,
        Aggregation::Sum,
    ]);
    table
        .add_rows([
            TableRow::new(0.0, vec![10.0, 12.0, 9.0, 11.0, 100.0]),
            TableRow::new(10_000.0, vec![11.0, 15.0, 10.0, 14.0, 50.0]),
            TableRow::new(50_000.0, vec![14.0, 14.5, 7.0, 8.0, f64::NAN]),
            TableRow::new(60_000.0, vec![8.0, 9.0, 8.0, 9.0, 10.0]),
        ])
        .expect("rows accepted");
    let minute = Interval::new(IntervalUnit::Minute, 1).expect("valid interval");

    let grouped = table.storage(Some(minute));
    let rows = grouped.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], TableRow::new(0.0, vec![10.0, 15.0, 7.0, 8.0, 150.0]));
    assert_eq!(rows[1], TableRow::new(60_000.0, vec![8.0, 9.0, 8.0, 9.0, 10.0]));
}

#[test]
fn decimal_rows_use_millisecond_keys() {
    let table = Table::new(vec![Aggregation::Last]);
    let time = Utc
        .timestamp_opt(1_700_000_000, 0)
        .single()
        .expect("valid ts");
    table
        .add_decimal_row(time, &[Decimal::new(12345, 2)])
        .expect("decimal row accepted");

    let storage = table.storage(None);
    let row = storage.row(0).expect("row");
    assert_eq!(row.key, 1_700_000_000_000.0);
    assert_eq!(key_to_datetime(row.key), Some(time));
    assert_eq!(key_to_datetime(f64::NAN), None);
    assert!((row.value(0) - 123.45).abs() <= 1e-9);
}

#[test]
fn clones_share_one_table() {
    let table = Table::new(vec![Aggregation::Last]);
    let other = table.clone();
    other
        .add_rows([TableRow::new(1.0, vec![1.0])])
        .expect("row accepted");
    assert!(table.ptr_eq(&other));
    assert_eq!(table.id(), other.id());
    assert_eq!(table.rows_count(), 1);
    assert!(!table.ptr_eq(&Table::new(vec![Aggregation::Last])));
}
