//! `calmirror clear` - remove every mirror from a destination calendar

use std::io::Write;

use calmirror_domain::Result;
use tokio_util::sync::CancellationToken;

use super::write_failed;
use crate::cli::ClearArgs;
use crate::context::AppContext;

pub async fn run(
    ctx: &AppContext,
    args: &ClearArgs,
    cancel: &CancellationToken,
    out: &mut impl Write,
) -> Result<()> {
    let summary = ctx.sync_service()?.clear(&args.account, &args.calendar, cancel).await?;
    writeln!(
        out,
        "Cleared {} mirrored events from {} ({} already gone)",
        summary.deleted, args.calendar, summary.already_gone
    )
    .map_err(write_failed)
}
