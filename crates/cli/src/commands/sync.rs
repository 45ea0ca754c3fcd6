//! `calmirror sync` - one mirroring pass

use std::io::Write;

use calmirror_core::sync::SyncSummary;
use calmirror_domain::Result;
use tokio_util::sync::CancellationToken;

use super::write_failed;
use crate::cli::SyncArgs;
use crate::context::AppContext;

pub async fn run(
    ctx: &AppContext,
    args: &SyncArgs,
    cancel: &CancellationToken,
    out: &mut impl Write,
) -> Result<()> {
    let request = args.to_request();
    let summary = ctx.sync_service()?.sync(&request, cancel).await?;
    render(&summary, out)
}

pub fn render(summary: &SyncSummary, out: &mut impl Write) -> Result<()> {
    writeln!(
        out,
        "Synced {} events over {} pages: {} created, {} updated, {} deleted, {} instances deleted",
        summary.seen,
        summary.pages,
        summary.created,
        summary.updated,
        summary.deleted,
        summary.deleted_instances,
    )
    .map_err(write_failed)?;

    if summary.deferred > 0 {
        writeln!(
            out,
            "{} events wait for their recurring parent; they are picked up by the next run",
            summary.deferred
        )
        .map_err(write_failed)?;
    }
    Ok(())
}
