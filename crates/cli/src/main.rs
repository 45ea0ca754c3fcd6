//! calmirror binary entry point

#![allow(clippy::print_stderr)]

use std::process::ExitCode;

use calmirror_cli::{logging, Cli};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

fn main() -> ExitCode {
    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.log_format) {
        eprintln!("failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "runtime.start_failed");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after the current request");
                on_signal.cancel();
            }
        });

        match calmirror_cli::run(cli, cancel).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!(kind = logging::error_label(&e), error = %e, "command.failed");
                if e.is_config() {
                    ExitCode::from(2)
                } else {
                    ExitCode::FAILURE
                }
            }
        }
    })
}
