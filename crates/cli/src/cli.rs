//! CLI argument parsing using clap derive

use std::path::PathBuf;
use std::time::Duration;

use calmirror_domain::{MappingOptions, SyncRequest};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::parse::{parse_duration, parse_start_after};

/// calmirror - mirror events from one calendar into another
#[derive(Parser, Debug)]
#[command(name = "calmirror")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(long, global = true, env = "CALMIRROR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Log line rendering
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Manage authenticated accounts
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// List authenticated accounts and the calendars they can see
    List,

    /// Mirror one calendar into another
    ///
    /// Examples:
    ///   calmirror sync --src-account me@work.com --src-calendar primary \
    ///     --dst-account me@home.com --dst-calendar <id> --updated-within 25d
    Sync(SyncArgs),

    /// Delete every mirrored event from a destination calendar
    Clear(ClearArgs),
}

/// Account actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum AuthAction {
    /// Authenticate a new account in the browser
    Add,
    /// List authenticated accounts
    List,
    /// Forget the stored tokens of an account
    Remove {
        /// Account email
        email: String,
    },
}

/// Visibility written on mirrored events
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Default,
    Public,
    Private,
    Confidential,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Public => "public",
            Self::Private => "private",
            Self::Confidential => "confidential",
        }
    }
}

/// Arguments of `sync`
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SyncArgs {
    /// Source account email
    #[arg(long)]
    pub src_account: String,

    /// Source calendar id
    #[arg(long)]
    pub src_calendar: String,

    /// Destination account email
    #[arg(long)]
    pub dst_account: String,

    /// Destination calendar id
    #[arg(long)]
    pub dst_calendar: String,

    /// Only consider events updated within this span (e.g. 25d, 12h, 90m)
    #[arg(long, value_parser = parse_duration)]
    pub updated_within: Option<Duration>,

    /// Only consider events ending after this instant (RFC 3339 or YYYY-MM-DD)
    #[arg(long, value_parser = parse_start_after)]
    pub start_after: Option<DateTime<Utc>>,

    /// Mirror events the owner answered "maybe"
    #[arg(long)]
    pub include_tentative: bool,

    /// Mirror events the owner declined
    #[arg(long)]
    pub include_not_going: bool,

    /// Mirror events the owner has not answered
    #[arg(long)]
    pub include_not_responded: bool,

    /// Mirror out-of-office events
    #[arg(long)]
    pub include_out_of_office: bool,

    /// Skip events whose title matches this regex
    #[arg(long, value_name = "REGEX")]
    pub exclude_title: Option<String>,

    /// Copy event descriptions
    #[arg(long)]
    pub copy_description: bool,

    /// Copy event locations
    #[arg(long)]
    pub copy_location: bool,

    /// Copy event colors
    #[arg(long)]
    pub copy_color: bool,

    /// Use this title for every mirrored event
    #[arg(long, value_name = "TEXT")]
    pub title_override: Option<String>,

    /// Visibility of mirrored events
    #[arg(long, value_enum, default_value_t = Visibility::Default)]
    pub visibility: Visibility,
}

impl SyncArgs {
    /// Sync request described by these arguments.
    pub fn to_request(&self) -> SyncRequest {
        let mut request = SyncRequest::new(
            &self.src_account,
            &self.src_calendar,
            &self.dst_account,
            &self.dst_calendar,
        );
        request.update_watermark = self.updated_within;
        request.start_after = self.start_after;
        request.include_tentative = self.include_tentative;
        request.include_not_going = self.include_not_going;
        request.include_not_responded = self.include_not_responded;
        request.include_out_of_office = self.include_out_of_office;
        request.exclude_title_pattern = self.exclude_title.clone();
        request.mapping = MappingOptions {
            copy_description: self.copy_description,
            copy_location: self.copy_location,
            copy_color: self.copy_color,
            title_override: self.title_override.clone(),
            visibility: self.visibility.as_str().to_string(),
        };
        request
    }
}

/// Arguments of `clear`
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ClearArgs {
    /// Destination account email
    #[arg(long)]
    pub account: String,

    /// Destination calendar id
    #[arg(long)]
    pub calendar: String,
}
