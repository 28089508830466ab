use serde::{Deserialize, Serialize};

use crate::core::IntervalLevel;
use crate::core::interval_list::standard_levels;
use crate::error::{StockError, StockResult};

/// Grouping settings of one selection track.
///
/// `max_visible_points` and `min_pixels_per_point` are alternatives: when
/// both are present the point cap wins, when neither is present one point per
/// pixel is allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupingConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub forced: bool,
    #[serde(default = "standard_levels")]
    pub levels: Vec<IntervalLevel>,
    #[serde(default)]
    pub max_visible_points: Option<f64>,
    #[serde(default)]
    pub min_pixels_per_point: Option<f64>,
}

impl GroupingConfig {
    /// Primary track defaults: standard levels, at most 500 visible points.
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: true,
            forced: false,
            levels: standard_levels(),
            max_visible_points: Some(default_max_visible_points()),
            min_pixels_per_point: None,
        }
    }

    /// Full-range track defaults: standard levels, one point per pixel.
    #[must_use]
    pub fn full_range() -> Self {
        Self {
            max_visible_points: None,
            min_pixels_per_point: Some(1.0),
            ..Self::new()
        }
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_forced(mut self, forced: bool) -> Self {
        self.forced = forced;
        self
    }

    #[must_use]
    pub fn with_levels(mut self, levels: Vec<IntervalLevel>) -> Self {
        self.levels = levels;
        self
    }

    /// Caps visible points and clears `min_pixels_per_point`.
    #[must_use]
    pub fn with_max_visible_points(mut self, max_visible_points: f64) -> Self {
        self.max_visible_points = Some(max_visible_points);
        self.min_pixels_per_point = None;
        self
    }

    /// Derives the point cap from pixel width and clears `max_visible_points`.
    #[must_use]
    pub fn with_min_pixels_per_point(mut self, min_pixels_per_point: f64) -> Self {
        self.min_pixels_per_point = Some(min_pixels_per_point);
        self.max_visible_points = None;
        self
    }

    pub fn validate(&self) -> StockResult<()> {
        if let Some(max_visible_points) = self.max_visible_points {
            if !max_visible_points.is_finite() || max_visible_points < 2.0 {
                return Err(StockError::InvalidConfig(format!(
                    "max_visible_points must be finite and >= 2, got {max_visible_points}"
                )));
            }
        }
        if let Some(min_pixels_per_point) = self.min_pixels_per_point {
            if !min_pixels_per_point.is_finite() || min_pixels_per_point < 0.1 {
                return Err(StockError::InvalidConfig(format!(
                    "min_pixels_per_point must be finite and >= 0.1, got {min_pixels_per_point}"
                )));
            }
        }
        if let Some(level) = self.levels.iter().find(|level| level.count == 0) {
            return Err(StockError::InvalidConfig(format!(
                "grouping level `{}` must have count >= 1",
                level.unit
            )));
        }
        Ok(())
    }
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Bootstrap configuration of a [`crate::stock::Controller`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default = "GroupingConfig::new")]
    pub grouping: GroupingConfig,
    #[serde(default = "GroupingConfig::full_range")]
    pub full_range_grouping: GroupingConfig,
    #[serde(default = "default_pixel_width")]
    pub pixel_width: f64,
}

impl ControllerConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            grouping: GroupingConfig::new(),
            full_range_grouping: GroupingConfig::full_range(),
            pixel_width: default_pixel_width(),
        }
    }

    #[must_use]
    pub fn with_grouping(mut self, grouping: GroupingConfig) -> Self {
        self.grouping = grouping;
        self
    }

    #[must_use]
    pub fn with_full_range_grouping(mut self, grouping: GroupingConfig) -> Self {
        self.full_range_grouping = grouping;
        self
    }

    #[must_use]
    pub fn with_pixel_width(mut self, pixel_width: f64) -> Self {
        self.pixel_width = pixel_width;
        self
    }

    pub fn validate(&self) -> StockResult<()> {
        if !self.pixel_width.is_finite() || self.pixel_width <= 0.0 {
            return Err(StockError::InvalidConfig(format!(
                "pixel_width must be finite and > 0, got {}",
                self.pixel_width
            )));
        }
        self.grouping.validate()?;
        self.full_range_grouping.validate()
    }

    /// Serializes config to pretty JSON.
    pub fn to_json_pretty(&self) -> StockResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserializes and validates config from JSON.
    pub fn from_json_str(input: &str) -> StockResult<Self> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_enabled() -> bool {
    true
}

fn default_max_visible_points() -> f64 {
    500.0
}

fn default_pixel_width() -> f64 {
    1000.0
}
