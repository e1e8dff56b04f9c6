//! Personal data store
//!
//! Backend selection, DRI routing and the facade the protocols store
//! payloads through.

pub mod facade;
pub mod graph;
pub mod routing;
pub mod selector;

pub use facade::{BackendsOverview, KeyedOutcome, LinkTargets, MultiFilter, MultiLoad, PersonalDataStore};
pub use graph::{GraphLimits, DEFAULT_MAX_DEPTH, DEFAULT_MAX_LOADS};
pub use routing::{RoutingTable, DEFAULT_ROUTE_CACHE_TTL};
pub use selector::BackendSelector;
