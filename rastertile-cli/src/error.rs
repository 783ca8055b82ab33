//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and a non-zero exit code.

use std::fmt;
use std::path::PathBuf;
use std::process;

use rastertile::config::ConfigError;
use rastertile::legend::LegendError;
use rastertile::raster::RasterError;
use rastertile::render::RenderError;
use rastertile::service::ServiceError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(std::io::Error),
    /// Configuration file could not be loaded
    Config(ConfigError),
    /// Bad command-line argument combination or value
    InvalidArgument(String),
    /// Legend file missing or malformed
    Legend { path: PathBuf, error: LegendError },
    /// Engine operation failed
    Service(ServiceError),
    /// Rendering or encoding failed
    Render(RenderError),
    /// Failed to read an input file
    FileRead { path: PathBuf, error: std::io::Error },
    /// Failed to write an output file
    FileWrite { path: PathBuf, error: std::io::Error },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Service(ServiceError::Raster(RasterError::SourceUnreadable { .. })) => {
                eprintln!();
                eprintln!("Only GeoTIFF input is supported. Make sure the file:");
                eprintln!("  1. Is a single-image TIFF with georeferencing tags");
                eprintln!("  2. Uses EPSG:4326 or EPSG:3857");
            }
            CliError::Service(ServiceError::Raster(RasterError::UnsupportedTransform { .. })) => {
                eprintln!();
                eprintln!("Reproject the raster to EPSG:4326 or EPSG:3857 first.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::InvalidArgument(msg) => write!(f, "{}", msg),
            CliError::Legend { path, error } => {
                write!(f, "Failed to load legend '{}': {}", path.display(), error)
            }
            CliError::Service(e) => write!(f, "{}", e),
            CliError::Render(e) => write!(f, "Failed to render tile: {}", e),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read file '{}': {}", path.display(), error)
            }
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path.display(), error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::Legend { error, .. } => Some(error),
            CliError::Service(e) => Some(e),
            CliError::Render(e) => Some(e),
            CliError::FileRead { error, .. } => Some(error),
            CliError::FileWrite { error, .. } => Some(error),
            CliError::InvalidArgument(_) => None,
        }
    }
}

impl From<ServiceError> for CliError {
    fn from(e: ServiceError) -> Self {
        CliError::Service(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<RenderError> for CliError {
    fn from(e: RenderError) -> Self {
        CliError::Render(e)
    }
}
