pub mod interval;
pub mod interval_list;
pub mod primitives;
pub mod types;

pub use interval::{Interval, IntervalBoundaries, IntervalUnit};
pub use interval_list::IntervalList;
pub use primitives::{datetime_to_key, decimal_to_f64, key_to_datetime};
pub use types::{IntervalLevel, SearchMode, TableRow};
