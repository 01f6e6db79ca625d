//! Main application entry point.

use std::process::ExitCode;

use clap::Parser;
use inkshare_app::{AppConfig, Args};

fn main() -> ExitCode {
    env_logger::init();
    let config = AppConfig::from(Args::parse());
    log::info!("Starting inkshare as {}", config.user);

    match inkshare_app::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("inkshare: {e}");
            ExitCode::FAILURE
        }
    }
}
