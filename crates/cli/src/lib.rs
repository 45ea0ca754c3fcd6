//! calmirror command-line interface
//!
//! Commands print their results to stdout; diagnostics go through `tracing`
//! to stderr.

pub mod cli;
pub mod commands;
pub mod context;
pub mod logging;
pub mod parse;

use calmirror_domain::Result;
use tokio_util::sync::CancellationToken;

pub use cli::{Cli, Commands};
pub use context::AppContext;

/// Dispatch one parsed command.
pub async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let ctx = AppContext::load(cli.config.as_deref())?;
    let mut out = std::io::stdout().lock();

    match cli.command {
        Commands::Auth { action } => commands::auth::run(&ctx, action, &cancel, &mut out).await,
        Commands::List => commands::list::run(&ctx, &mut out).await,
        Commands::Sync(args) => commands::sync::run(&ctx, &args, &cancel, &mut out).await,
        Commands::Clear(args) => commands::clear::run(&ctx, &args, &cancel, &mut out).await,
    }
}
