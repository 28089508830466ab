use crate::core::{Interval, IntervalLevel};
use crate::stock::controller::{Controller, SelectionTrack};
use crate::stock::registry::{Boundaries, RegistryIter, Selection};

impl Controller {
    /// Key at a (fractional) index of the primary track's registry.
    pub fn key_by_index(&mut self, index: f64) -> f64 {
        self.track_registry(SelectionTrack::Primary)
            .key_by_index(index)
    }

    pub fn index_by_key(&mut self, key: f64) -> f64 {
        self.track_registry(SelectionTrack::Primary)
            .index_by_key(key)
    }

    pub fn key_by_main_index(&mut self, index: f64) -> f64 {
        self.ensure_main();
        self.main.key_by_index(index)
    }

    pub fn main_index_by_key(&mut self, key: f64) -> f64 {
        self.ensure_main();
        self.main.index_by_key(key)
    }

    pub fn key_by_full_range_index(&mut self, index: f64) -> f64 {
        self.track_registry(SelectionTrack::FullRange)
            .key_by_index(index)
    }

    pub fn full_range_index_by_key(&mut self, key: f64) -> f64 {
        self.track_registry(SelectionTrack::FullRange)
            .index_by_key(key)
    }

    /// Snaps a hovered key to the nearest key shown by the primary track.
    pub fn align_highlight(&mut self, key: f64) -> f64 {
        self.track_registry(SelectionTrack::Primary).align_key(key)
    }

    pub fn first_key(&mut self) -> f64 {
        self.ensure_main();
        self.main.first_key()
    }

    pub fn last_key(&mut self) -> f64 {
        self.ensure_main();
        self.main.last_key()
    }

    pub fn full_range_boundaries(&mut self) -> Boundaries {
        self.ensure_main();
        self.main.boundaries()
    }

    pub fn first_main_index(&mut self) -> Option<usize> {
        self.ensure_main();
        self.main.first_index()
    }

    pub fn last_main_index(&mut self) -> Option<usize> {
        self.ensure_main();
        self.main.last_index()
    }

    pub fn first_index(&mut self) -> Option<usize> {
        self.track_registry(SelectionTrack::Primary).first_index()
    }

    pub fn last_index(&mut self) -> Option<usize> {
        self.track_registry(SelectionTrack::Primary).last_index()
    }

    #[must_use]
    pub fn first_selected_key(&self) -> f64 {
        self.primary.selection.start_key
    }

    #[must_use]
    pub fn last_selected_key(&self) -> f64 {
        self.primary.selection.end_key
    }

    /// Fractional registry position of the requested window start.
    #[must_use]
    pub fn first_selected_index(&self) -> f64 {
        self.primary.selection.start_index
    }

    #[must_use]
    pub fn last_selected_index(&self) -> f64 {
        self.primary.selection.end_index
    }

    /// First key actually shown, clamped to existing data.
    pub fn first_visible_key(&mut self) -> f64 {
        let Some(index) = self.primary.selection.first_index else {
            return f64::NAN;
        };
        self.track_registry(SelectionTrack::Primary)
            .key_by_index(index as f64)
    }

    pub fn last_visible_key(&mut self) -> f64 {
        let Some(index) = self.primary.selection.last_index else {
            return f64::NAN;
        };
        self.track_registry(SelectionTrack::Primary)
            .key_by_index(index as f64)
    }

    #[must_use]
    pub fn first_visible_index(&self) -> Option<usize> {
        self.primary.selection.first_index
    }

    #[must_use]
    pub fn last_visible_index(&self) -> Option<usize> {
        self.primary.selection.last_index
    }

    /// `true` when the visible window touches the leading data edge.
    #[must_use]
    pub fn sticks_left(&self) -> bool {
        self.primary.selection.pre_first_index.is_none()
            && !self.primary.selection.start_key.is_nan()
    }

    /// `true` when the visible window touches the trailing data edge.
    #[must_use]
    pub fn sticks_right(&self) -> bool {
        self.primary.selection.post_last_index.is_none()
            && !self.primary.selection.start_key.is_nan()
    }

    #[must_use]
    pub fn current_min_distance(&self) -> Option<f64> {
        self.primary.selection.min_distance
    }

    #[must_use]
    pub fn full_range_min_distance(&self) -> Option<f64> {
        self.full_range.selection.min_distance
    }

    #[must_use]
    pub fn first_full_range_index(&self) -> f64 {
        self.full_range.selection.start_index
    }

    #[must_use]
    pub fn last_full_range_index(&self) -> f64 {
        self.full_range.selection.end_index
    }

    #[must_use]
    pub fn current_interval(&self) -> Option<Interval> {
        self.primary.interval
    }

    #[must_use]
    pub fn full_range_interval(&self) -> Option<Interval> {
        self.full_range.interval
    }

    #[must_use]
    pub fn current_grouping_level(&self) -> IntervalLevel {
        self.grouping.current_level()
    }

    #[must_use]
    pub fn full_range_grouping_level(&self) -> IntervalLevel {
        self.full_range_grouping.current_level()
    }

    #[must_use]
    pub fn is_grouped(&self) -> bool {
        self.primary.interval.is_some()
    }

    /// Number of points the whole dataset has at the current grouping.
    pub fn global_points_count_for_current_grouping(&mut self) -> usize {
        self.track_registry(SelectionTrack::Primary).keys_count()
    }

    #[must_use]
    pub fn current_selection(&self) -> Selection {
        self.primary.selection
    }

    #[must_use]
    pub fn full_range_selection(&self) -> Selection {
        self.full_range.selection
    }

    /// Merged key walk for sources that do not share the registry layout.
    ///
    /// Returns `None` in sync mode, where sources can be iterated by index.
    /// `exporting` walks every key instead of the selected window.
    pub fn co_iterator(
        &mut self,
        track: SelectionTrack,
        exporting: bool,
    ) -> Option<RegistryIter<'_>> {
        let selection = self.track(track).selection;
        let registry = self.track_registry(track);
        if registry.is_in_sync_mode() {
            return None;
        }
        let (first, last) = if exporting {
            (registry.first_index(), registry.last_index())
        } else {
            (selection.first_index, selection.last_index)
        };
        Some(match (first, last) {
            (Some(first), Some(last)) => registry.iter_range(first, last),
            _ => registry.iter_range(1, 0),
        })
    }
}
