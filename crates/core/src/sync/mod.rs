//! Calendar mirroring: ports, event mapping, exclusion rules and the sync
//! engine.

pub mod engine;
pub mod exclusion;
pub mod mapper;
pub mod ports;
pub mod service;

pub use engine::{build_query, ClearSummary, SyncEngine, SyncSummary, MAX_ATTEMPTS};
pub use exclusion::{ExclusionPolicy, ExclusionReason};
pub use mapper::map_event;
pub use ports::{BackendResult, CalendarBackend, CalendarConnector, CorrelationStore};
pub use service::{AccountCalendars, SyncService};
