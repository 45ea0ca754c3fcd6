//! # calmirror Domain
//!
//! Data types shared by every calmirror crate.
//!
//! This crate contains:
//! - Event identities, correlation records and sync requests
//! - Calendar payload types
//! - Error types and Result definitions
//! - Configuration structures and constants
//!
//! ## Architecture
//! - No dependencies on other calmirror crates
//! - Only external dependencies allowed

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
