use std::rc::Rc;

use approx::relative_eq;
use chart_stock::core::TableRow;
use chart_stock::data::TableStorage;
use chart_stock::stock::Registry;
use proptest::prelude::*;

fn registry_from_gaps(start: f64, gaps: &[f64]) -> Registry {
    let mut key = start;
    let mut rows = vec![TableRow::new(key, vec![0.0])];
    for gap in gaps {
        key += gap;
        rows.push(TableRow::new(key, vec![0.0]));
    }
    let mut registry = Registry::new();
    registry.add_source(Rc::new(TableStorage::new(None, rows, 1)));
    registry.update();
    registry
}

proptest! {
    #[test]
    fn index_key_conversion_inverse_property(
        start in -1_000_000.0f64..1_000_000.0,
        gaps in prop::collection::vec(1.0f64..1_000.0, 1..40),
        position in 0.0f64..1.0,
        overshoot in -5.0f64..5.0
    ) {
        let registry = registry_from_gaps(start, &gaps);
        let last = gaps.len() as f64;
        let index = position * last + overshoot;

        let key = registry.key_by_index(index);
        let recovered = registry.index_by_key(key);
        prop_assert!(relative_eq!(recovered, index, epsilon = 1e-6));
    }

    #[test]
    fn existing_keys_map_to_integer_indexes(
        start in -1_000_000.0f64..1_000_000.0,
        gaps in prop::collection::vec(1.0f64..1_000.0, 1..40)
    ) {
        let registry = registry_from_gaps(start, &gaps);
        for (index, key) in registry.keys().iter().enumerate() {
            prop_assert_eq!(registry.index_by_key(*key), index as f64);
            prop_assert_eq!(registry.key_by_index(index as f64), *key);
        }
    }

    #[test]
    fn wider_windows_never_show_fewer_keys(
        gaps in prop::collection::vec(1.0f64..100.0, 1..60),
        inner_start in 0.0f64..1.0,
        inner_span in 0.0f64..1.0,
        grow_left in 0.0f64..500.0,
        grow_right in 0.0f64..500.0
    ) {
        let registry = registry_from_gaps(0.0, &gaps);
        let total: f64 = gaps.iter().sum();
        let start = inner_start * total;
        let end = start + inner_span * (total - start);

        let inner = registry.selection(start, end);
        let outer = registry.selection(start - grow_left, end + grow_right);
        prop_assert!(outer.visible_count() >= inner.visible_count());
        if let (Some(inner_first), Some(outer_first)) = (inner.first_index, outer.first_index) {
            prop_assert!(outer_first <= inner_first);
        }
        if let (Some(inner_last), Some(outer_last)) = (inner.last_index, outer.last_index) {
            prop_assert!(outer_last >= inner_last);
        }
        prop_assert!(outer.start_index <= inner.start_index);
        prop_assert!(outer.end_index >= inner.end_index);
    }

    #[test]
    fn selection_sentinels_bracket_visible_keys(
        gaps in prop::collection::vec(1.0f64..100.0, 1..60),
        start in -200.0f64..6_000.0,
        span in 0.0f64..3_000.0
    ) {
        let registry = registry_from_gaps(0.0, &gaps);
        let end = start + span;
        let selection = registry.selection(start, end);
        let keys = registry.keys();

        if let Some(pre_first) = selection.pre_first_index {
            prop_assert!(keys[pre_first] < start);
        }
        if let Some(post_last) = selection.post_last_index {
            prop_assert!(keys[post_last] > end);
        }
        if let (Some(first), Some(last)) = (selection.first_index, selection.last_index) {
            prop_assert!(keys[first] >= start && keys[last] <= end);
            prop_assert_eq!(selection.visible_count(), last - first + 1);
        } else {
            prop_assert_eq!(selection.visible_count(), 0);
        }
    }
}
