//! Resilience patterns for calling rate-limited APIs
//!
//! - **Token Bucket**: spaces outbound calls and lets callers wait for a slot
//!   with cooperative cancellation

pub mod rate_limiter;

pub use rate_limiter::{RateLimitError, TokenBucket, TokenBucketConfig, TokenBucketConfigBuilder};
