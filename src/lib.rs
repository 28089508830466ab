//! chart-stock: multi-resolution data selection for stock charts.
//!
//! Tables hold time-keyed rows and lazily grouped copies of them. A
//! [`Controller`] merges the tables of a chart into registries, picks the
//! grouping interval for the visible window and publishes selections to every
//! registered [`TableSelectable`].

pub mod core;
pub mod data;
pub mod error;
pub mod stock;
pub mod telemetry;

pub use crate::core::{Interval, IntervalLevel, IntervalList, IntervalUnit, SearchMode, TableRow};
pub use crate::data::{Aggregation, SharedSelectable, Table, TableMapping, TableSelectable};
pub use crate::error::{StockError, StockResult};
pub use crate::stock::{Controller, ControllerConfig, GroupingConfig, Registry, Selection};
