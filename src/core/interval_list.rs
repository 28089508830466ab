use tracing::warn;

use crate::core::{Interval, IntervalLevel, IntervalUnit};
use crate::error::StockResult;

/// Ascending, duplicate-free catalogue of grouping intervals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntervalList {
    intervals: Vec<Interval>,
}

impl IntervalList {
    #[must_use]
    pub fn new(intervals: impl IntoIterator<Item = Interval>) -> Self {
        let mut intervals: Vec<Interval> = intervals.into_iter().collect();
        let original_count = intervals.len();
        intervals.sort();
        intervals.dedup();
        if intervals.len() != original_count {
            warn!(
                original_count,
                unique_count = intervals.len(),
                "duplicate grouping levels dropped"
            );
        }
        Self { intervals }
    }

    pub fn from_levels(levels: &[IntervalLevel]) -> StockResult<Self> {
        let intervals = levels
            .iter()
            .map(|level| Interval::from_level(*level))
            .collect::<StockResult<Vec<_>>>()?;
        Ok(Self::new(intervals))
    }

    /// The stock chart level catalogue, from 1 ms up to 1 year.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(standard_levels().into_iter().filter_map(|level| {
            Interval::from_level(level).ok()
        }))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Interval> + '_ {
        self.intervals.iter().copied()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Interval> {
        self.intervals.get(index).copied()
    }

    #[must_use]
    pub fn position(&self, interval: &Interval) -> Option<usize> {
        self.intervals.binary_search(interval).ok()
    }

    #[must_use]
    pub fn levels(&self) -> Vec<IntervalLevel> {
        self.iter().map(Interval::level).collect()
    }

    /// Picks the finest interval that fits `key_span` into `point_count` buckets.
    ///
    /// Falls back to the coarsest interval when none is large enough and
    /// returns `None` only for an empty list.
    #[must_use]
    pub fn choose_interval(&self, key_span: f64, point_count: Option<f64>) -> Option<Interval> {
        let target = match point_count {
            Some(count) => key_span / count,
            None => key_span,
        };
        self.intervals
            .iter()
            .copied()
            .find(|interval| interval.range() >= target)
            .or_else(|| self.intervals.last().copied())
    }
}

/// Default grouping levels shared by the primary and full-range tracks.
#[must_use]
pub fn standard_levels() -> Vec<IntervalLevel> {
    use IntervalUnit::{Day, Hour, Millisecond, Minute, Month, Second, Week, Year};

    [
        (Millisecond, 1),
        (Millisecond, 5),
        (Millisecond, 10),
        (Millisecond, 25),
        (Millisecond, 50),
        (Millisecond, 100),
        (Millisecond, 250),
        (Millisecond, 500),
        (Second, 1),
        (Second, 5),
        (Second, 10),
        (Second, 20),
        (Second, 30),
        (Minute, 1),
        (Minute, 5),
        (Minute, 15),
        (Minute, 30),
        (Hour, 1),
        (Hour, 2),
        (Hour, 6),
        (Hour, 12),
        (Day, 1),
        (Week, 1),
        (Month, 1),
        (Month, 3),
        (Month, 6),
        (Year, 1),
    ]
    .into_iter()
    .map(|(unit, count)| IntervalLevel::new(unit, count))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::IntervalList;
    use crate::core::{Interval, IntervalUnit};

    fn interval(unit: IntervalUnit, count: u32) -> Interval {
        Interval::new(unit, count).expect("valid interval")
    }

    #[test]
    fn new_sorts_and_deduplicates() {
        let list = IntervalList::new([
            interval(IntervalUnit::Day, 1),
            interval(IntervalUnit::Minute, 1),
            interval(IntervalUnit::Day, 1),
        ]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0), Some(interval(IntervalUnit::Minute, 1)));
        assert_eq!(list.position(&interval(IntervalUnit::Day, 1)), Some(1));
    }

    #[test]
    fn standard_catalogue_has_27_levels() {
        let list = IntervalList::standard();
        assert_eq!(list.len(), 27);
        assert_eq!(list.get(0), Some(interval(IntervalUnit::Millisecond, 1)));
        assert_eq!(list.get(26), Some(interval(IntervalUnit::Year, 1)));
    }

    #[test]
    fn choose_interval_falls_back_to_coarsest() {
        let list = IntervalList::new([
            interval(IntervalUnit::Second, 1),
            interval(IntervalUnit::Minute, 1),
        ]);
        assert_eq!(
            list.choose_interval(3_600_000.0, Some(10.0)),
            Some(interval(IntervalUnit::Minute, 1))
        );
        assert_eq!(
            list.choose_interval(500.0, None),
            Some(interval(IntervalUnit::Second, 1))
        );
        assert_eq!(IntervalList::default().choose_interval(1.0, None), None);
    }
}
