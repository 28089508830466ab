pub mod aggregation;
pub mod mapping;
pub mod selectable;
pub mod storage;
pub mod table;

pub use aggregation::{Aggregation, Aggregator};
pub use mapping::TableMapping;
pub use selectable::{
    RowIter, RowView, SelectableId, SelectionUpdate, SharedSelectable, TableSelectable,
};
pub use storage::{StorageSelection, TableStorage};
pub use table::{SubscriptionId, Table, TableId, TableObserver};
