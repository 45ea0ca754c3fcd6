//! Google Calendar integration
//!
//! - [`client`]: REST backend implementing `CalendarBackend`
//! - [`connector`]: stored account to backend, with token refresh
//! - [`oauth`]: loopback PKCE login
//! - [`token_store`]: JSON token persistence
//! - [`credentials`]: OAuth client registration from config

pub mod client;
pub mod connector;
pub mod credentials;
pub mod oauth;
pub mod token_store;

pub use client::GoogleCalendarClient;
pub use connector::GoogleConnector;
pub use credentials::oauth_settings;
pub use oauth::{GoogleLogin, LoginSession, OAuthCallbackServer};
pub use token_store::{StoredAccount, TokenStore};
