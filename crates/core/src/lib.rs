//! # calmirror Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces for the correlation store and calendar backends
//! - The event mapper and exclusion rules
//! - The sync engine and the service façade over it
//!
//! ## Architecture Principles
//! - Only depends on `calmirror-common` and `calmirror-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod sync;

pub use sync::{
    AccountCalendars, BackendResult, CalendarBackend, CalendarConnector, ClearSummary,
    CorrelationStore, ExclusionPolicy, SyncEngine, SyncService, SyncSummary,
};
