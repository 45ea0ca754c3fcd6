//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Event classification
pub const OUT_OF_OFFICE_MARKER: &str = "This is an out-of-office event";
pub const DEFAULT_VISIBILITY: &str = "default";

// Rate limiting (one destination call per interval)
pub const DEFAULT_RATE_LIMIT_INTERVAL_MS: u64 = 350;
pub const MIN_RATE_LIMIT_INTERVAL_MS: u64 = 250;
pub const DEFAULT_PAGE_SIZE: u32 = 250;

// Storage
pub const DEFAULT_DB_FILE: &str = "sync.db";
pub const DEFAULT_TOKEN_FILE: &str = "tokens.json";
pub const DEFAULT_POOL_SIZE: u32 = 4;
pub const APP_DIR_NAME: &str = "calmirror";

// Google endpoints
pub const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
pub const GOOGLE_SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/calendar.readonly",
    "https://www.googleapis.com/auth/calendar.events",
    "https://www.googleapis.com/auth/userinfo.email",
];

// OAuth
pub const TOKEN_REFRESH_THRESHOLD_SECS: i64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 300;
