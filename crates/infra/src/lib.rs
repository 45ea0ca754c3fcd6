//! # calmirror Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - SQLite correlation store with a single-process lock
//! - Google Calendar REST backend, OAuth login and token store
//! - Configuration loading
//!
//! ## Architecture
//! - Implements traits defined in `calmirror-core`
//! - Contains all "impure" code (I/O, HTTP, filesystem)

pub mod config;
pub mod database;
pub mod errors;
pub mod instance_lock;
pub mod integrations;

// Re-export commonly used items
pub use database::*;
pub use errors::InfraError;
pub use instance_lock::*;
pub use integrations::google;
