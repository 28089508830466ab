use chart_stock::core::{Interval, IntervalUnit, SearchMode, TableRow};
use chart_stock::data::{Aggregation, Table, TableMapping, TableSelectable};
use chart_stock::error::StockError;

fn table() -> Table {
    let table = Table::new(vec![Aggregation::Last, Aggregation::Max]);
    table
        .add_rows((0..10).map(|i| {
            let key = f64::from(i);
            TableRow::new(key, vec![key, key * 10.0])
        }))
        .expect("rows accepted");
    table
}

fn selectable(table: &Table) -> TableSelectable {
    let mapping = TableMapping::new(table.clone())
        .with_field("close", 0)
        .and_then(|mapping| mapping.with_field("high", 1))
        .expect("valid fields");
    TableSelectable::new(mapping)
}

#[test]
fn standalone_select_exposes_rows_and_sentinels() {
    let table = table();
    let mut source = selectable(&table);

    assert!(source.select(2.0, 5.0, None));
    assert!(!source.select(2.0, 5.0, None));
    let rows = source.iter();
    assert_eq!(rows.len(), 4);
    let keys: Vec<f64> = rows.map(|row| row.key).collect();
    assert_eq!(keys, vec![2.0, 3.0, 4.0, 5.0]);

    assert_eq!(source.pre_first_row().map(|row| row.index), Some(1));
    assert_eq!(source.post_last_row().map(|row| row.index), Some(6));
    let first = source.first_visible_row().expect("first row");
    assert_eq!(first.value(1), 20.0);
    assert!(first.value(7).is_nan());
    assert_eq!(first.to_row(), TableRow::new(2.0, vec![2.0, 20.0]));
}

#[test]
fn min_max_cover_sentinel_rows() {
    let table = table();
    let mut source = selectable(&table);
    assert!(source.min("close").expect("known field").is_nan());

    source.select(2.0, 5.0, None);
    assert_eq!(source.min("close").expect("known field"), 1.0);
    assert_eq!(source.max("high").expect("known field"), 60.0);
    assert!(matches!(
        source.max("volume"),
        Err(StockError::UnknownField(field)) if field == "volume"
    ));
}

#[test]
fn search_modes_resolve_misses() {
    let table = table();
    let mut source = selectable(&table);
    assert!(source.search(4.0, SearchMode::Exact).is_none());

    source.select_all(None);
    let key = |mode| source.search(4.5, mode).map(|row| row.key);
    assert_eq!(key(SearchMode::Exact), None);
    assert_eq!(key(SearchMode::ExactOrPrev), Some(4.0));
    assert_eq!(key(SearchMode::ExactOrNext), Some(5.0));
    assert_eq!(key(SearchMode::Nearest), Some(5.0));
    assert_eq!(
        source.search(4.4, SearchMode::Nearest).map(|row| row.key),
        Some(4.0)
    );
    assert_eq!(
        source.search(-1.0, SearchMode::ExactOrPrev).map(|row| row.key),
        None
    );
    assert_eq!(source.iter().count(), 10);
}

#[test]
fn aggregated_selection_keeps_raw_lookup() {
    let table = Table::new(vec![Aggregation::Last]);
    table
        .add_rows((0..180).map(|i| TableRow::new(f64::from(i) * 1_000.0, vec![f64::from(i)])))
        .expect("rows accepted");
    let mut source = TableSelectable::new(TableMapping::new(table.clone()));
    let minute = Interval::new(IntervalUnit::Minute, 1).expect("valid interval");

    assert!(source.select(0.0, 180_000.0, Some(minute)));
    assert!(source.is_aggregated());
    assert_eq!(source.interval(), Some(minute));
    let grouped: Vec<(f64, f64)> = source.iter().map(|row| (row.key, row.value(0))).collect();
    assert_eq!(
        grouped,
        vec![(0.0, 59.0), (60_000.0, 119.0), (120_000.0, 179.0)]
    );

    let raw = source
        .row_from_main_storage(61_000.0)
        .expect("raw row exists");
    assert_eq!(raw, TableRow::new(61_000.0, vec![61.0]));
    assert_eq!(source.row_from_main_storage(61_500.0), None);
}

#[test]
fn data_changes_and_invalidation_force_reselection() {
    let table = table();
    let mut source = selectable(&table);
    assert!(source.select(2.0, 5.0, None));

    source.invalidate_selection();
    assert!(source.select(2.0, 5.0, None));
    assert!(!source.select(2.0, 5.0, None));

    table
        .add_rows([TableRow::new(3.5, vec![3.5, 35.0])])
        .expect("row accepted");
    assert!(source.select(2.0, 5.0, None));
    assert_eq!(source.iter().count(), 5);
}

#[test]
fn empty_windows_have_no_rows() {
    let table = table();
    let mut source = selectable(&table);
    source.select(20.0, 30.0, None);

    let selection = source.selection().expect("selection stored");
    assert!(selection.is_empty());
    assert_eq!(selection.pre_first_index, Some(9));
    assert_eq!(source.iter().count(), 0);
    assert!(source.first_visible_row().is_none());
    assert_eq!(source.pre_first_row().map(|row| row.key), Some(9.0));
}

#[test]
fn mapping_rejects_missing_columns() {
    let table = table();
    let err = TableMapping::new(table)
        .with_field("volume", 2)
        .expect_err("column out of range");
    assert!(matches!(err, StockError::InvalidData(_)));
}
