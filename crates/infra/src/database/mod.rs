//! Database implementations

pub mod correlation_store;
pub mod manager;

pub use correlation_store::SqliteCorrelationStore;
pub use manager::{DbManager, SqliteConnection};
