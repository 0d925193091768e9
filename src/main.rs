#![warn(rust_2018_idioms)]

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use wlrsetroot::{cli::Cli, wayland};

fn init_logging() {
    if let Ok(env_filter) = tracing_subscriber::EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt()
            .compact()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().compact().init();
    }
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let config = match cli.pattern_config() {
        Ok(config) => config,
        Err(err) => {
            error!(?err, "Failed to load bitmap");
            return ExitCode::FAILURE;
        }
    };
    info!(pattern = %config.pattern, scale = %config.scale, "Starting wlrsetroot");

    match wayland::run(config, cli.display.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(?err, "Fatal error: {}", err);
            ExitCode::FAILURE
        }
    }
}
