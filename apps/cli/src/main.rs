//! `platup` entry point.

mod commands;
mod config;
mod errors;
mod logging;
mod progress;

use std::process;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use commands::{Cli, Context};
use config::{CliConfig, default_config_path};
use errors::{CliError, CliErrorKind, classify_exit_code};

#[tokio::main]
async fn main() {
    let start = Instant::now();
    let cli = Cli::parse();
    if let Err(e) = logging::init_logging(&cli.log_level) {
        eprintln!("error: invalid log level {:?}: {e}", cli.log_level);
        process::exit(errors::USAGE);
    }

    let exit_code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e:#}");
            classify_exit_code(&e)
        }
    };
    info!(took_ms = %start.elapsed().as_millis(), exit_code, "finished");
    if exit_code != 0 {
        process::exit(exit_code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = match &cli.config {
        Some(p) => p.clone(),
        None => default_config_path()?,
    };
    let config = CliConfig::load(&config_path).map_err(|e| {
        if classify_exit_code(&e) == errors::CONFIG {
            e
        } else {
            CliError::with_source(
                CliErrorKind::Config(format!("cannot load {}", config_path.display())),
                e,
            )
            .into()
        }
    })?;

    let ctx = Context::new(config, cli.api_url.clone(), cli.insecure)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        api_url = %ctx.api_url,
        "starting platup"
    );
    commands::dispatch(cli, ctx).await
}
