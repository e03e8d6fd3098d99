//! `authgate` binary.

use std::process::ExitCode;

use authgate_server::{cli::ServeArgs, server, telemetry};
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    let args = ServeArgs::parse();
    telemetry::init(&args.log_level, args.log_json);

    match server::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "authgate failed");
            ExitCode::FAILURE
        },
    }
}
