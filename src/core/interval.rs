use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::core::IntervalLevel;
use crate::error::{StockError, StockResult};

const MILLIS_PER_SECOND: f64 = 1_000.0;
const MILLIS_PER_MINUTE: f64 = 60.0 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: f64 = 60.0 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: f64 = 24.0 * MILLIS_PER_HOUR;
const MILLIS_PER_WEEK: f64 = 7.0 * MILLIS_PER_DAY;
const MILLIS_PER_YEAR: f64 = 365.25 * MILLIS_PER_DAY;

/// 2000-01-01T00:00:00Z, the origin of fixed-width bucket alignment.
const ALIGN_BASE_MILLIS: f64 = 946_684_800_000.0;
/// 2000-01-02T00:00:00Z, a Sunday, the origin of week alignment.
const WEEK_ALIGN_BASE_MILLIS: f64 = 946_771_200_000.0;
const ALIGN_BASE_YEAR: i64 = 2000;

/// Calendar or fixed-width unit of a grouping interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntervalUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    ThirdOfMonth,
    Month,
    Quarter,
    Semester,
    Year,
}

impl IntervalUnit {
    pub const ALL: [IntervalUnit; 11] = [
        Self::Millisecond,
        Self::Second,
        Self::Minute,
        Self::Hour,
        Self::Day,
        Self::Week,
        Self::ThirdOfMonth,
        Self::Month,
        Self::Quarter,
        Self::Semester,
        Self::Year,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Millisecond => "millisecond",
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::ThirdOfMonth => "third-of-month",
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Semester => "semester",
            Self::Year => "year",
        }
    }

    /// Approximate duration of a single unit in milliseconds.
    #[must_use]
    pub const fn unit_range(self) -> f64 {
        match self {
            Self::Millisecond => 1.0,
            Self::Second => MILLIS_PER_SECOND,
            Self::Minute => MILLIS_PER_MINUTE,
            Self::Hour => MILLIS_PER_HOUR,
            Self::Day => MILLIS_PER_DAY,
            Self::Week => MILLIS_PER_WEEK,
            Self::ThirdOfMonth => MILLIS_PER_YEAR / 36.0,
            Self::Month => MILLIS_PER_YEAR / 12.0,
            Self::Quarter => MILLIS_PER_YEAR / 4.0,
            Self::Semester => MILLIS_PER_YEAR / 2.0,
            Self::Year => MILLIS_PER_YEAR,
        }
    }

    const fn fixed_width(self) -> Option<f64> {
        match self {
            Self::Millisecond
            | Self::Second
            | Self::Minute
            | Self::Hour
            | Self::Day
            | Self::Week => Some(self.unit_range()),
            _ => None,
        }
    }

    const fn months_per_unit(self) -> Option<i64> {
        match self {
            Self::Month => Some(1),
            Self::Quarter => Some(3),
            Self::Semester => Some(6),
            Self::Year => Some(12),
            _ => None,
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntervalUnit {
    type Err = StockError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|unit| unit.as_str() == normalized)
            .ok_or_else(|| StockError::InvalidConfig(format!("unknown interval unit `{value}`")))
    }
}

/// One fixed aggregation granularity, e.g. "15 minutes".
///
/// `Interval` is a plain value: it is `Copy`, hashes structurally and is used
/// directly as the cache key of grouped registries and aggregated storages.
/// Use [`IntervalLevel`] for the serialized form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    unit: IntervalUnit,
    count: u32,
}

impl Interval {
    pub fn new(unit: IntervalUnit, count: u32) -> StockResult<Self> {
        if count == 0 {
            return Err(StockError::InvalidConfig(format!(
                "interval count for `{unit}` must be >= 1"
            )));
        }
        Ok(Self { unit, count })
    }

    pub fn from_level(level: IntervalLevel) -> StockResult<Self> {
        Self::new(level.unit, level.count)
    }

    #[must_use]
    pub fn unit(self) -> IntervalUnit {
        self.unit
    }

    #[must_use]
    pub fn count(self) -> u32 {
        self.count
    }

    #[must_use]
    pub fn level(self) -> IntervalLevel {
        IntervalLevel::new(self.unit, self.count)
    }

    /// Approximate duration in milliseconds.
    #[must_use]
    pub fn range(self) -> f64 {
        self.unit.unit_range() * f64::from(self.count)
    }

    /// Stable textual identity, e.g. `minute15`.
    #[must_use]
    pub fn hash_key(self) -> String {
        format!("{}{}", self.unit.as_str(), self.count)
    }

    /// Returns the start of the bucket that contains `key`.
    #[must_use]
    pub fn align(self, key: f64) -> f64 {
        if !key.is_finite() {
            return f64::NAN;
        }
        if let Some(width) = self.unit.fixed_width() {
            let step = width * f64::from(self.count);
            let base = if self.unit == IntervalUnit::Week {
                WEEK_ALIGN_BASE_MILLIS
            } else {
                ALIGN_BASE_MILLIS
            };
            return base + ((key - base) / step).floor() * step;
        }

        let (ordinal, base, step) = match self.unit.months_per_unit() {
            Some(months) => (
                month_ordinal(key),
                ALIGN_BASE_YEAR * 12,
                i64::from(self.count) * months,
            ),
            None => (
                third_of_month_ordinal(key),
                ALIGN_BASE_YEAR * 36,
                i64::from(self.count),
            ),
        };
        let Some(ordinal) = ordinal else {
            return f64::NAN;
        };
        let aligned = base + (ordinal - base).div_euclid(step) * step;
        self.ordinal_to_key(aligned)
    }

    /// Returns the bucket start following the aligned key `aligned`.
    #[must_use]
    pub fn next_boundary(self, aligned: f64) -> f64 {
        if !aligned.is_finite() {
            return f64::NAN;
        }
        if let Some(width) = self.unit.fixed_width() {
            return aligned + width * f64::from(self.count);
        }
        match self.unit.months_per_unit() {
            Some(months) => month_ordinal(aligned).map_or(f64::NAN, |ordinal| {
                self.ordinal_to_key(ordinal + i64::from(self.count) * months)
            }),
            None => third_of_month_ordinal(aligned).map_or(f64::NAN, |ordinal| {
                self.ordinal_to_key(ordinal + i64::from(self.count))
            }),
        }
    }

    /// Iterates bucket starts covering `[start, end]`.
    #[must_use]
    pub fn boundaries(self, start: f64, end: f64) -> IntervalBoundaries {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        IntervalBoundaries {
            interval: self,
            next: self.align(start),
            end,
        }
    }

    /// Returns `(start of the bucket holding first, end of the bucket holding last)`.
    #[must_use]
    pub fn aligned_boundaries(self, first: f64, last: f64) -> (f64, f64) {
        (self.align(first), self.next_boundary(self.align(last)))
    }

    /// Describes a key distance with the closest human-readable unit/count pair.
    #[must_use]
    pub fn estimate(distance: f64) -> IntervalLevel {
        let distance = distance.floor();
        if distance.is_nan() || distance < 1.0 {
            return IntervalLevel::new(IntervalUnit::Millisecond, 1);
        }

        let mut largest: Option<&Estimation> = None;
        let mut chosen = &ESTIMATIONS[ESTIMATIONS.len() - 1];
        let mut count = 1.0;
        for estimation in &ESTIMATIONS {
            let ratio = distance / estimation.range;
            // 10% slack absorbs rounding noise in the measured distance
            if (ratio * 1.1).floor() >= 1.0 {
                largest.get_or_insert(estimation);
                chosen = estimation;
                if ratio - ratio.floor() < 0.15 {
                    count = ratio.floor().max(1.0);
                    break;
                }
            }
        }
        if let Some(largest) = largest {
            if largest.unit != chosen.unit && largest.basic && count > 100.0 {
                chosen = largest;
                count = (20.0 * distance / largest.range).round() / 20.0;
            }
        }

        let count = count.round().clamp(1.0, f64::from(u32::MAX)) as u32;
        IntervalLevel::new(chosen.unit, count)
    }

    fn ordinal_to_key(self, ordinal: i64) -> f64 {
        if self.unit.months_per_unit().is_some() {
            month_ordinal_to_key(ordinal, 1)
        } else {
            month_ordinal_to_key(ordinal.div_euclid(3), 1 + ordinal.rem_euclid(3) as u32 * 10)
        }
    }
}

impl Ord for Interval {
    /// Orders by range; on equal ranges the interval with the larger unit
    /// (smaller count) is the bigger one.
    fn cmp(&self, other: &Self) -> Ordering {
        self.range()
            .total_cmp(&other.range())
            .then_with(|| other.count.cmp(&self.count))
            .then_with(|| self.unit.cmp(&other.unit))
    }
}

impl PartialOrd for Interval {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.count, self.unit)
    }
}

/// Iterator over bucket starts produced by [`Interval::boundaries`].
#[derive(Debug, Clone)]
pub struct IntervalBoundaries {
    interval: Interval,
    next: f64,
    end: f64,
}

impl Iterator for IntervalBoundaries {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if !self.next.is_finite() || self.next > self.end {
            return None;
        }
        let current = self.next;
        self.next = self.interval.next_boundary(current);
        Some(current)
    }
}

struct Estimation {
    unit: IntervalUnit,
    range: f64,
    basic: bool,
}

static ESTIMATIONS: [Estimation; 11] = [
    Estimation {
        unit: IntervalUnit::Year,
        range: 365.0 * MILLIS_PER_DAY,
        basic: true,
    },
    Estimation {
        unit: IntervalUnit::Semester,
        range: 365.0 * MILLIS_PER_DAY / 2.0,
        basic: false,
    },
    Estimation {
        unit: IntervalUnit::Quarter,
        range: 365.0 * MILLIS_PER_DAY / 4.0,
        basic: false,
    },
    Estimation {
        unit: IntervalUnit::Month,
        range: 28.0 * MILLIS_PER_DAY,
        basic: true,
    },
    Estimation {
        unit: IntervalUnit::ThirdOfMonth,
        range: 365.0 * MILLIS_PER_DAY / 36.0,
        basic: false,
    },
    Estimation {
        unit: IntervalUnit::Week,
        range: MILLIS_PER_WEEK,
        basic: false,
    },
    Estimation {
        unit: IntervalUnit::Day,
        range: MILLIS_PER_DAY,
        basic: true,
    },
    Estimation {
        unit: IntervalUnit::Hour,
        range: MILLIS_PER_HOUR,
        basic: true,
    },
    Estimation {
        unit: IntervalUnit::Minute,
        range: MILLIS_PER_MINUTE,
        basic: true,
    },
    Estimation {
        unit: IntervalUnit::Second,
        range: MILLIS_PER_SECOND,
        basic: true,
    },
    Estimation {
        unit: IntervalUnit::Millisecond,
        range: 1.0,
        basic: true,
    },
];

fn utc_datetime(key: f64) -> Option<DateTime<Utc>> {
    if !key.is_finite() {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(key.floor() as i64)
}

fn month_ordinal(key: f64) -> Option<i64> {
    let date = utc_datetime(key)?;
    Some(i64::from(date.year()) * 12 + i64::from(date.month0()))
}

fn third_of_month_ordinal(key: f64) -> Option<i64> {
    let date = utc_datetime(key)?;
    let third = match date.day() {
        1..=10 => 0,
        11..=20 => 1,
        _ => 2,
    };
    Some((i64::from(date.year()) * 12 + i64::from(date.month0())) * 3 + third)
}

fn month_ordinal_to_key(ordinal: i64, day: u32) -> f64 {
    let month = ordinal.rem_euclid(12) as u32 + 1;
    i32::try_from(ordinal.div_euclid(12))
        .ok()
        .and_then(|year| Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single())
        .map_or(f64::NAN, |date| date.timestamp_millis() as f64)
}
