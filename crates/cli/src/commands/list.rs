//! `calmirror list` - accounts and their calendars

use std::io::Write;

use calmirror_core::sync::AccountCalendars;
use calmirror_domain::Result;

use super::write_failed;
use crate::context::AppContext;

pub async fn run(ctx: &AppContext, out: &mut impl Write) -> Result<()> {
    let listing = ctx.sync_service()?.calendars().await?;
    render(&listing, out)
}

/// One header line per account followed by `summary (id)` per calendar.
pub fn render(listing: &[AccountCalendars], out: &mut impl Write) -> Result<()> {
    if listing.is_empty() {
        return writeln!(out, "No accounts authenticated (run `calmirror auth add`)")
            .map_err(write_failed);
    }

    for account in listing {
        writeln!(out, "{}", account.account_email).map_err(write_failed)?;
        for calendar in &account.calendars {
            if calendar.summary.is_empty() {
                writeln!(out, "  {}", calendar.id).map_err(write_failed)?;
            } else {
                writeln!(out, "  {} ({})", calendar.summary, calendar.id).map_err(write_failed)?;
            }
        }
    }
    Ok(())
}
