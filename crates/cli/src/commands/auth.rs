//! `calmirror auth` - add, list and remove accounts

use std::io::Write;

use calmirror_domain::{CalMirrorError, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::write_failed;
use crate::cli::AuthAction;
use crate::context::AppContext;

pub async fn run(
    ctx: &AppContext,
    action: AuthAction,
    cancel: &CancellationToken,
    out: &mut impl Write,
) -> Result<()> {
    match action {
        AuthAction::Add => add(ctx, cancel, out).await,
        AuthAction::List => list(ctx, out),
        AuthAction::Remove { email } => remove(ctx, &email, out),
    }
}

async fn add(ctx: &AppContext, cancel: &CancellationToken, out: &mut impl Write) -> Result<()> {
    let login = ctx.login()?;
    let session = login.start().await?;

    writeln!(out, "Open this URL in your browser to authorize calmirror:").map_err(write_failed)?;
    writeln!(out, "\n  {}\n", session.authorization_url()).map_err(write_failed)?;
    out.flush().map_err(write_failed)?;

    let (email, tokens) = session.finish(ctx.config.google.login_timeout(), cancel).await?;
    ctx.tokens.upsert(&email, tokens)?;
    info!(email = %email, "auth.account.added");

    writeln!(out, "Authenticated {email}").map_err(write_failed)
}

fn list(ctx: &AppContext, out: &mut impl Write) -> Result<()> {
    let emails = ctx.tokens.emails()?;
    if emails.is_empty() {
        return writeln!(out, "No accounts authenticated (run `calmirror auth add`)")
            .map_err(write_failed);
    }
    for email in emails {
        writeln!(out, "{email}").map_err(write_failed)?;
    }
    Ok(())
}

fn remove(ctx: &AppContext, email: &str, out: &mut impl Write) -> Result<()> {
    if !ctx.tokens.remove(email)? {
        return Err(CalMirrorError::NotFound(format!("account {email}")));
    }
    writeln!(out, "Removed {email}").map_err(write_failed)
}
