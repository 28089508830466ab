use tracing::trace;

use crate::core::{Interval, IntervalLevel, IntervalList, IntervalUnit};
use crate::error::{StockError, StockResult};
use crate::stock::controller_config::GroupingConfig;
use crate::stock::registry::Registry;

/// Grouping settings and state of one selection track.
#[derive(Debug, Clone)]
pub struct Grouping {
    enabled: bool,
    forced: bool,
    intervals: IntervalList,
    max_visible_points: Option<f64>,
    min_pixels_per_point: Option<f64>,
    current_interval: Option<Interval>,
    current_level: IntervalLevel,
}

impl Grouping {
    pub fn from_config(config: &GroupingConfig) -> StockResult<Self> {
        config.validate()?;
        Ok(Self {
            enabled: config.enabled,
            forced: config.forced,
            intervals: IntervalList::from_levels(&config.levels)?,
            max_visible_points: config.max_visible_points,
            min_pixels_per_point: config.min_pixels_per_point,
            current_interval: None,
            current_level: raw_level(),
        })
    }

    #[must_use]
    pub fn config(&self) -> GroupingConfig {
        GroupingConfig {
            enabled: self.enabled,
            forced: self.forced,
            levels: self.intervals.levels(),
            max_visible_points: self.max_visible_points,
            min_pixels_per_point: self.min_pixels_per_point,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    #[must_use]
    pub fn is_forced(&self) -> bool {
        self.forced
    }

    pub fn set_forced(&mut self, forced: bool) {
        self.forced = forced;
    }

    #[must_use]
    pub fn intervals(&self) -> &IntervalList {
        &self.intervals
    }

    pub fn set_levels(&mut self, levels: &[IntervalLevel]) -> StockResult<()> {
        self.intervals = IntervalList::from_levels(levels)?;
        Ok(())
    }

    #[must_use]
    pub fn max_visible_points(&self) -> Option<f64> {
        self.max_visible_points
    }

    /// Sets the point cap (clamped to at least 2) and clears the pixel density.
    pub fn set_max_visible_points(&mut self, max_visible_points: f64) -> StockResult<()> {
        if max_visible_points.is_nan() {
            return Err(StockError::InvalidConfig(
                "max_visible_points must be a number".to_owned(),
            ));
        }
        self.max_visible_points = Some(max_visible_points.max(2.0));
        self.min_pixels_per_point = None;
        Ok(())
    }

    #[must_use]
    pub fn min_pixels_per_point(&self) -> Option<f64> {
        self.min_pixels_per_point
    }

    /// Sets the pixel density (clamped to at least 0.1) and clears the point cap.
    pub fn set_min_pixels_per_point(&mut self, min_pixels_per_point: f64) -> StockResult<()> {
        if min_pixels_per_point.is_nan() {
            return Err(StockError::InvalidConfig(
                "min_pixels_per_point must be a number".to_owned(),
            ));
        }
        self.min_pixels_per_point = Some(min_pixels_per_point.max(0.1));
        self.max_visible_points = None;
        Ok(())
    }

    /// Maximum number of points the track may show at `pixel_width`.
    #[must_use]
    pub fn target_points(&self, pixel_width: f64) -> f64 {
        match self.max_visible_points {
            Some(points) => points,
            None => pixel_width / self.min_pixels_per_point.unwrap_or(1.0),
        }
    }

    /// Chooses the grouping interval for `[start_key, end_key]`, `None` for raw data.
    ///
    /// Records the outcome, see [`Grouping::current_level`].
    pub fn choose_interval(
        &mut self,
        start_key: f64,
        end_key: f64,
        target_points: f64,
        main: &Registry,
    ) -> Option<Interval> {
        let selection = main.selection(start_key, end_key);
        let raw_points = selection.visible_count() as f64;
        let min_distance = selection.min_distance.filter(|distance| *distance > 0.0);

        let mut chosen = None;
        if self.enabled
            && !self.intervals.is_empty()
            && main.keys_count() > 0
            && min_distance.is_some()
            && (self.forced || raw_points > target_points)
        {
            chosen = self
                .candidates(min_distance)
                .choose_interval(end_key - start_key, Some(target_points));
            if let Some(interval) = chosen {
                if natural_resolution(main) >= interval.range() {
                    chosen = None;
                }
            }
        }

        self.current_interval = chosen;
        self.current_level = match chosen {
            Some(interval) => interval.level(),
            None => min_distance.map_or_else(raw_level, Interval::estimate),
        };
        trace!(
            raw_points,
            target_points,
            interval = ?chosen,
            "grouping interval chosen"
        );
        chosen
    }

    #[must_use]
    pub fn current_interval(&self) -> Option<Interval> {
        self.current_interval
    }

    /// Level describing the data currently shown by the track.
    #[must_use]
    pub fn current_level(&self) -> IntervalLevel {
        self.current_level
    }

    #[must_use]
    pub fn is_grouped(&self) -> bool {
        self.current_interval.is_some()
    }

    /// Levels no finer than the one just below the data's own spacing.
    fn candidates(&self, min_distance: Option<f64>) -> IntervalList {
        let Some(min_distance) = min_distance else {
            return self.intervals.clone();
        };
        let finer = self
            .intervals
            .iter()
            .take_while(|interval| interval.range() <= min_distance)
            .count();
        IntervalList::new(self.intervals.iter().skip(finer.saturating_sub(1)))
    }
}

impl Grouping {
    /// Full-range track defaults, one point per pixel.
    #[must_use]
    pub fn full_range() -> Self {
        Self {
            max_visible_points: None,
            min_pixels_per_point: Some(1.0),
            ..Self::default()
        }
    }
}

impl Default for Grouping {
    fn default() -> Self {
        Self {
            enabled: true,
            forced: false,
            intervals: IntervalList::standard(),
            max_visible_points: GroupingConfig::new().max_visible_points,
            min_pixels_per_point: None,
            current_interval: None,
            current_level: raw_level(),
        }
    }
}

/// Average key distance of the raw data.
fn natural_resolution(main: &Registry) -> f64 {
    match (main.first_index(), main.last_index()) {
        (Some(first), Some(last)) if last > first => {
            (main.last_key() - main.first_key()) / (last - first) as f64
        }
        _ => 0.0,
    }
}

fn raw_level() -> IntervalLevel {
    IntervalLevel::new(IntervalUnit::Millisecond, 1)
}
