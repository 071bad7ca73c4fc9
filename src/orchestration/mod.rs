//! Agent selection, dispatch and the orchestrator facade

pub mod dispatcher;
pub mod facade;
pub mod routing;

pub use dispatcher::{DispatchRequest, DispatchSettings, Dispatcher};
pub use facade::{HistoryPage, Orchestrator};
pub use routing::{CapabilityRouter, RoutingPolicy, RoutingRequest, Selection, SelectionReason};
