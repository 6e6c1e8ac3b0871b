//! fleetmap - live device positions from an IoT backend
//!
//! Polls the backend for device fixes and keeps a marker view up to date
//! in the terminal.

use clap::{Parser, Subcommand};
use fleetmap_api_client::ApiError;
use fleetmap_cli::{OutputFormat, Status};
use fleetmap_core::config::{Config, LoggingConfig};
use fleetmap_core::error::exit_codes;
use fleetmap_telemetry::TelemetryConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;

mod commands;
mod surface;

use commands::{fetch, occupancy, watch};

/// Live device-location viewer
#[derive(Parser)]
#[command(name = "fleetmap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (default: fleetmap.toml, .fleetmap.toml, .config/fleetmap.toml, user config dir)
    #[arg(short, long, global = true, env = "FLEETMAP_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll continuously and show marker changes and ridership until Ctrl-C
    Watch,

    /// Fetch positions once and print them
    Fetch,

    /// Show riders aboard, free seats and predicted drop-offs
    Occupancy {
        /// 1-based stop number for the drop-off prediction (`watch` follows the route instead)
        #[arg(short, long, default_value = "1")]
        stop: usize,
    },

    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration, API key redacted
    Show,

    /// Validate the configuration and exit
    Check,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            Status::error(&e.to_string());
            ExitCode::from(u8::try_from(exit_code(&e)).unwrap_or(1))
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let _telemetry = fleetmap_telemetry::init_with_config(telemetry_config(
        &config.schema.logging,
        cli.verbose,
    ))?;

    match cli.command {
        Commands::Watch => watch::run(&runtime()?, &config, cli.format),
        Commands::Fetch => runtime()?.block_on(fetch::run(&config, cli.format)),
        Commands::Occupancy { stop } => {
            runtime()?.block_on(occupancy::run(&config, stop, cli.format))
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&config, cli.format),
            ConfigAction::Check => commands::config::check(&config, cli.format),
        },
    }
}

fn runtime() -> anyhow::Result<Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("fleetmap-worker")
        .build()?)
}

fn telemetry_config(logging: &LoggingConfig, verbose: bool) -> TelemetryConfig {
    TelemetryConfig {
        log_level: if verbose {
            "debug".to_string()
        } else {
            logging.level.clone()
        },
        json: logging.json,
        log_dir: logging.directory.clone(),
        show_target: verbose,
        ..TelemetryConfig::default()
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<fleetmap_core::Error>() {
        e.exit_code()
    } else if let Some(e) = err.downcast_ref::<ApiError>() {
        e.exit_code()
    } else {
        exit_codes::FAILURE
    }
}
