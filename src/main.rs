//! instascrape - CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use instascrape::{
    cli::{execute, Args},
    config::Config,
    error::{exit_codes, Error, Result},
    fs::AppPaths,
    output::{print_error, print_info, print_warning},
};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt().with_env_filter(filter).with_target(false).init();

    tokio::select! {
        result = run(args) => match result {
            Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
            Err(e) => report(&e),
        },
        _ = tokio::signal::ctrl_c() => {
            print_warning("Interrupted");
            ExitCode::from(exit_codes::INTERRUPTED as u8)
        }
    }
}

fn report(error: &Error) -> ExitCode {
    print_error(&format!("{}", error));
    if let Some(hint) = error.remediation() {
        print_info(hint);
    }
    ExitCode::from(error.kind().exit_code() as u8)
}

async fn run(args: Args) -> Result<()> {
    let config_path = match args.config {
        Some(path) => path,
        None => AppPaths::resolve(None)?.config_file(),
    };
    let config = Config::load_or_default(&config_path)?;
    tracing::debug!("Configuration: {}", config_path.display());

    execute(args.command, config).await
}
