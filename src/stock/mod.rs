pub mod controller;
pub mod controller_config;
mod controller_queries;
pub mod grouping;
pub mod registry;

pub use controller::{
    Controller, ControllerId, ControllerSignal, RefreshResult, SelectionTrack,
};
pub use controller_config::{ControllerConfig, GroupingConfig};
pub use grouping::Grouping;
pub use registry::{Boundaries, Registry, RegistryIter, Selection};
