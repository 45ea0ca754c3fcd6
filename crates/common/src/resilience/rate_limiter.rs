//! Token bucket rate limiting for outbound API calls
//!
//! The bucket holds up to `capacity` tokens and gains `refill_amount` tokens
//! every `refill_interval`. Callers either probe with [`TokenBucket::try_acquire`]
//! or suspend with [`TokenBucket::acquire`], which honours a
//! [`CancellationToken`].
//!
//! Time is read from `tokio::time`, so tests can run on a paused clock.

use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Errors produced by the rate limiter
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("invalid rate limiter configuration: {0}")]
    InvalidConfig(String),

    #[error("rate limiter wait cancelled")]
    Cancelled,
}

/// Configuration for token bucket rate limiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBucketConfig {
    /// Maximum number of tokens the bucket can hold
    pub capacity: u64,
    /// Number of tokens to refill per interval
    pub refill_amount: u64,
    /// Time interval for token refill
    pub refill_interval: Duration,
}

impl Default for TokenBucketConfig {
    fn default() -> Self {
        Self { capacity: 1, refill_amount: 1, refill_interval: Duration::from_millis(350) }
    }
}

impl TokenBucketConfig {
    /// Create a new configuration builder
    pub fn builder() -> TokenBucketConfigBuilder {
        TokenBucketConfigBuilder::new()
    }

    /// One call per `interval`, no bursts.
    pub fn every(interval: Duration) -> Self {
        Self { refill_interval: interval, ..Self::default() }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.capacity == 0 {
            return Err(RateLimitError::InvalidConfig("capacity must be greater than 0".into()));
        }
        if self.refill_amount == 0 {
            return Err(RateLimitError::InvalidConfig(
                "refill_amount must be greater than 0".into(),
            ));
        }
        if self.refill_interval.is_zero() {
            return Err(RateLimitError::InvalidConfig(
                "refill_interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for TokenBucketConfig
#[derive(Debug)]
pub struct TokenBucketConfigBuilder {
    config: TokenBucketConfig,
}

impl Default for TokenBucketConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenBucketConfigBuilder {
    pub fn new() -> Self {
        Self { config: TokenBucketConfig::default() }
    }

    pub fn capacity(mut self, capacity: u64) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn refill_amount(mut self, amount: u64) -> Self {
        self.config.refill_amount = amount;
        self
    }

    pub fn refill_interval(mut self, interval: Duration) -> Self {
        self.config.refill_interval = interval;
        self
    }

    pub fn build(self) -> Result<TokenBucketConfig, RateLimitError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: u64,
    last_refill: Instant,
}

/// Token bucket rate limiter
///
/// Starts full, so the first `capacity` calls pass immediately.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use calmirror_common::resilience::{TokenBucket, TokenBucketConfig};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = TokenBucket::new(TokenBucketConfig::every(Duration::from_millis(350)))?;
/// let cancel = CancellationToken::new();
///
/// limiter.acquire(&cancel).await?;
/// // issue the API call
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TokenBucket {
    config: TokenBucketConfig,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a new token bucket
    pub fn new(config: TokenBucketConfig) -> Result<Self, RateLimitError> {
        config.validate()?;
        let state = BucketState { tokens: config.capacity, last_refill: Instant::now() };
        Ok(Self { config, state: Mutex::new(state) })
    }

    pub fn config(&self) -> &TokenBucketConfig {
        &self.config
    }

    /// Refill tokens based on elapsed time
    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        let refills = elapsed.as_nanos() / self.config.refill_interval.as_nanos();

        if refills > 0 {
            let refills = u64::try_from(refills).unwrap_or(u64::MAX);
            let tokens_to_add = refills.saturating_mul(self.config.refill_amount);
            state.tokens = state.tokens.saturating_add(tokens_to_add).min(self.config.capacity);
            state.last_refill = now;
            trace!(tokens = state.tokens, "rate_limiter.refilled");
        }
    }

    /// Take one token without waiting.
    ///
    /// Returns `false` if the bucket is empty.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        self.refill(&mut state, Instant::now());

        if state.tokens == 0 {
            return false;
        }
        state.tokens -= 1;
        true
    }

    /// Wait until a token is available and take it.
    ///
    /// Returns [`RateLimitError::Cancelled`] as soon as `cancel` fires, even
    /// mid-wait.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), RateLimitError> {
        loop {
            if cancel.is_cancelled() {
                return Err(RateLimitError::Cancelled);
            }

            let wake_at = {
                let mut state = self.state.lock();
                let now = Instant::now();
                self.refill(&mut state, now);

                if state.tokens > 0 {
                    state.tokens -= 1;
                    return Ok(());
                }
                state.last_refill + self.config.refill_interval
            };

            debug!(
                wait_ms = wake_at.saturating_duration_since(Instant::now()).as_millis() as u64,
                "rate_limiter.waiting"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(RateLimitError::Cancelled),
                () = sleep_until(wake_at) => {}
            }
        }
    }

    /// Get the current number of available tokens
    pub fn available_tokens(&self) -> u64 {
        let mut state = self.state.lock();
        self.refill(&mut state, Instant::now());
        state.tokens
    }

    /// Reset the limiter to full capacity
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.tokens = self.config.capacity;
        state.last_refill = Instant::now();
    }
}
