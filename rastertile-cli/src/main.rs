//! rastertile CLI - Command-line interface
//!
//! Builds tile pyramids from GeoTIFF rasters, writes them out as PNG tiles,
//! and prints value counts and statistics as JSON.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rastertile::config::EngineConfig;
use rastertile::logging::{default_log_file, init_logging, LoggingGuard};
use rastertile::service::TileService;

use commands::common::{parse_binding, CountArgs, KindArg};
use error::CliError;

#[derive(Parser)]
#[command(name = "rastertile")]
#[command(about = "Raster tile pyramids with legend rendering, band algebra and value counts")]
#[command(version)]
struct Cli {
    /// Configuration file (INI); defaults to ~/.rastertile/config.ini
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for the log file
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Describe a raster and the pyramid it would produce
    Info {
        /// GeoTIFF to inspect
        raster: PathBuf,

        /// Layer kind (selects the default resampling)
        #[arg(long, value_enum, default_value = "categorical")]
        kind: KindArg,
    },

    /// Build the pyramid and write DIR/{z}/{x}/{y}.png
    Tiles {
        /// GeoTIFF to tile
        raster: PathBuf,

        /// Output directory
        #[arg(long)]
        out: PathBuf,

        /// Legend JSON used to colour the tiles (default: grey ramp)
        #[arg(long)]
        legend: Option<PathBuf>,

        /// Layer kind: categorical tiles use the legend's entries,
        /// continuous tiles interpolate between its thresholds
        #[arg(long = "layer-kind", value_enum, default_value = "categorical")]
        kind: KindArg,
    },

    /// Print the value count of a raster as JSON
    ValueCount {
        /// GeoTIFF to count
        raster: PathBuf,

        #[command(flatten)]
        args: CountArgs,
    },

    /// Print the value count of a formula over several rasters as JSON
    Algebra {
        /// Input binding NAME=PATH (repeatable)
        #[arg(long = "layer", value_parser = parse_binding, required = true)]
        layers: Vec<(String, PathBuf)>,

        /// Formula over the layer names, e.g. "(a > 3) & (b == 1)"
        #[arg(long)]
        formula: String,

        #[command(flatten)]
        args: CountArgs,
    },
}

fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rastertile")
        .join("config.ini")
}

fn default_log_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("rastertile")
        .join("logs")
}

fn setup(cli: &Cli) -> Result<(LoggingGuard, TileService), CliError> {
    let log_dir = cli.log_dir.clone().unwrap_or_else(default_log_dir);
    let guard = init_logging(&log_dir, default_log_file()).map_err(CliError::LoggingInit)?;

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = EngineConfig::load_from(&config_path)?;
    tracing::debug!(path = %config_path.display(), ?config, "Configuration loaded");

    let service = TileService::new(config)?;
    Ok((guard, service))
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let (_guard, service) = setup(&cli)?;
    match cli.command {
        Command::Info { raster, kind } => commands::info::run(&service, raster, kind).await,
        Command::Tiles {
            raster,
            out,
            legend,
            kind,
        } => commands::tiles::run(&service, raster, out, legend, kind).await,
        Command::ValueCount { raster, args } => {
            commands::value_count::run(&service, raster, args).await
        }
        Command::Algebra {
            layers,
            formula,
            args,
        } => commands::algebra::run(&service, layers, formula, args).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        e.exit();
    }
}
