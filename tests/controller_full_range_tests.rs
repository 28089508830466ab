use chart_stock::core::{Interval, IntervalUnit, TableRow};
use chart_stock::data::{Aggregation, SharedSelectable, Table, TableMapping, TableSelectable};
use chart_stock::stock::{Controller, RefreshResult, SelectionTrack};

fn table(keys: impl IntoIterator<Item = f64>) -> Table {
    let table = Table::new(vec![Aggregation::Max]);
    table
        .add_rows(keys.into_iter().map(|key| TableRow::new(key, vec![key])))
        .expect("rows accepted");
    table
}

fn selectable(table: &Table) -> SharedSelectable {
    TableSelectable::shared(TableMapping::new(table.clone()))
}

#[test]
fn full_range_refresh_keeps_primary_selection() {
    let table = table((0..1_000).map(f64::from));
    let primary = selectable(&table);
    let overview = selectable(&table);
    let mut controller = Controller::default();
    controller.register_source(&primary, true);
    controller.register_source(&overview, false);

    assert!(controller.select(100.0, 200.0, false));
    let before = controller.current_selection();
    controller.refresh_full_range_sources(100.0);
    assert_eq!(controller.current_selection(), before);
    assert_eq!(primary.borrow().iter().count(), 101);

    let full_range = controller.full_range_selection();
    assert_eq!(full_range.start_key, 0.0);
    assert_eq!(full_range.end_key, 999.0);
    controller.select(300.0, 400.0, false);
    assert_eq!(controller.full_range_selection(), full_range);
}

#[test]
fn full_range_track_groups_by_points_count() {
    let table = table((0..10_000).map(|i| f64::from(i) * 1_000.0));
    let overview = selectable(&table);
    let mut controller = Controller::default();
    controller.register_source(&overview, false);

    controller.refresh_full_range_sources(100.0);
    let interval = Interval::new(IntervalUnit::Minute, 5).expect("valid interval");
    assert_eq!(controller.full_range_interval(), Some(interval));
    assert_eq!(controller.full_range_grouping_level(), interval.level());
    assert_eq!(controller.current_interval(), None);

    let source = overview.borrow();
    assert!(source.is_aggregated());
    assert_eq!(source.iter().count(), 34);
    let first = source.first_visible_row().expect("first grouped row");
    assert_eq!(first.key, 0.0);
    assert_eq!(first.values, &[299_000.0]);
}

#[test]
fn full_range_conversions_use_full_range_registry() {
    let table = table((0..10_000).map(|i| f64::from(i) * 1_000.0));
    let overview = selectable(&table);
    let mut controller = Controller::default();
    controller.register_source(&overview, false);
    controller.refresh_full_range_sources(100.0);

    assert_eq!(controller.key_by_full_range_index(1.0), 300_000.0);
    assert_eq!(controller.full_range_index_by_key(600_000.0), 2.0);
    assert_eq!(controller.first_full_range_index(), 0.0);
    assert_eq!(controller.full_range_min_distance(), Some(300_000.0));
}

#[test]
fn refresh_selection_follows_sticking_edges() {
    let table = table((0..100).map(f64::from));
    let source = selectable(&table);
    let mut controller = Controller::default();
    controller.register_source(&source, true);

    controller.select(50.0, 99.0, false);
    assert!(controller.sticks_right());
    assert!(!controller.sticks_left());

    table
        .add_rows((100..110).map(|key| TableRow::new(f64::from(key), vec![0.0])))
        .expect("rows accepted");
    let result = controller.refresh_selection(800.0);
    assert_eq!(
        result,
        RefreshResult {
            primary: true,
            full_range: true,
        }
    );
    assert_eq!(controller.first_selected_key(), 50.0);
    assert_eq!(controller.last_selected_key(), 109.0);
    assert_eq!(source.borrow().last_visible_row().map(|row| row.key), Some(109.0));
}

#[test]
fn refresh_selection_keeps_floating_windows() {
    let table = table((0..100).map(f64::from));
    let source = selectable(&table);
    let mut controller = Controller::default();
    controller.register_source(&source, true);
    controller.select(10.0, 20.0, false);

    table
        .add_rows([TableRow::new(100.0, vec![0.0])])
        .expect("row accepted");
    controller.refresh_selection(800.0);
    assert_eq!(controller.first_selected_key(), 10.0);
    assert_eq!(controller.last_selected_key(), 20.0);

    let unchanged = controller.refresh_selection(800.0);
    assert_eq!(unchanged, RefreshResult::default());
}

#[test]
fn refresh_selection_without_data_is_a_no_op() {
    let mut controller = Controller::default();
    assert_eq!(controller.refresh_selection(800.0), RefreshResult::default());
    assert!(controller.current_selection().start_key.is_nan());
}

#[test]
fn full_range_sources_see_mutations_after_primary_rebuild() {
    let table = table((0..10).map(f64::from));
    let primary = selectable(&table);
    let overview = selectable(&table);
    let mut controller = Controller::default();
    controller.register_source(&primary, true);
    controller.register_source(&overview, false);
    controller.select(2.0, 7.0, false);
    controller.refresh_full_range_sources(100.0);

    table
        .add_rows([TableRow::new(0.0, vec![42.0])])
        .expect("row accepted");
    assert!(controller.select(2.0, 7.0, false));
    controller.refresh_full_range_sources(100.0);

    let source = overview.borrow();
    let first = source.first_visible_row().expect("first overview row");
    assert_eq!(first.key, 0.0);
    assert_eq!(first.value(0), 42.0);
}

#[test]
fn full_range_grouping_edits_take_effect_on_refresh() {
    let table = table((0..120).map(|i| f64::from(i) * 1_000.0));
    let overview = selectable(&table);
    let mut controller = Controller::default();
    controller.register_source(&overview, false);
    controller.refresh_full_range_sources(100.0);
    let five_seconds = Interval::new(IntervalUnit::Second, 5).expect("valid interval");
    assert_eq!(controller.full_range_interval(), Some(five_seconds));

    let minute = Interval::new(IntervalUnit::Minute, 1).expect("valid interval");
    controller
        .edit_grouping(SelectionTrack::FullRange, |grouping| {
            grouping.set_forced(true);
            grouping.set_levels(&[minute.level()])
        })
        .expect("edit accepted");
    assert!(controller.full_range_grouping().is_forced());
    assert_eq!(controller.full_range_grouping().intervals().len(), 1);
    assert_eq!(controller.grouping().intervals().len(), 27);

    controller.refresh_full_range_sources(100.0);
    assert_eq!(controller.full_range_interval(), Some(minute));
    assert_eq!(overview.borrow().iter().count(), 2);
}
