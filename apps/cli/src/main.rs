mod args;
mod commands;

use anyhow::{Context, Result};
use args::{Cli, Command};
use clap::Parser;
use fv_kernel::config::load_config;
use fv_kernel::settings::{AppConfig, LoggingSettings};
use fv_logger::{FileFormat, Logger};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg: AppConfig = load_config(cli.config.as_deref()).context("Failed to load settings")?;
    let _log = init_logger(&cfg.logging, cli.log.as_deref())?;

    let engine = cfg.vault.engine_config();
    tracing::debug!(?engine, "Engine configuration resolved");

    match &cli.command {
        Command::Encrypt(args) => commands::encrypt(args, engine),
        Command::Decrypt(args) => commands::decrypt(args, engine),
        Command::Inspect { input } => commands::inspect_file(input, &mut std::io::stdout().lock()),
    }
}

fn init_logger(settings: &LoggingSettings, filter: Option<&str>) -> Result<Logger> {
    let builder = Logger::builder()
        .name(env!("CARGO_PKG_NAME"))
        .console(true)
        .env_filter(filter.unwrap_or(settings.level.as_str()));

    let logger = match &settings.directory {
        Some(directory) => builder
            .directory(directory)
            .format(if settings.json { FileFormat::Json } else { FileFormat::Plain })
            .init(),
        None => builder.init(),
    };
    logger.context("Failed to initialize logging")
}
