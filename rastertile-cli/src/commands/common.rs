//! Common types and utilities shared across CLI commands.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, ValueEnum};
use rastertile::aggregate::{Aggregator, Grouping};
use rastertile::coord::LayerId;
use rastertile::index::LayerKind;
use rastertile::legend::Legend;
use rastertile::service::TileService;
use tokio_util::sync::CancellationToken;

use crate::error::CliError;

/// Layer kind selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum KindArg {
    /// Class codes (nearest-neighbour resampling, counts per value)
    Categorical,
    /// Measurements (bilinear resampling, counts per interval)
    Continuous,
}

impl From<KindArg> for LayerKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Categorical => LayerKind::Categorical,
            KindArg::Continuous => LayerKind::Continuous,
        }
    }
}

/// Value-count grouping selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum BinningArg {
    /// One bucket per distinct value
    Categorical,
    /// Fixed-width intervals (see --width)
    Continuous,
}

/// Options shared by the commands that count values.
#[derive(Debug, Args)]
pub struct CountArgs {
    /// Zoom level to aggregate at (default: deepest level built for every layer)
    #[arg(long)]
    pub zoom: Option<u8>,

    /// Grouping of values (default follows --kind)
    #[arg(long, value_enum)]
    pub binning: Option<BinningArg>,

    /// Interval width for continuous grouping (default from config)
    #[arg(long)]
    pub width: Option<f64>,

    /// Group by the entries of a legend JSON file instead
    #[arg(long, conflicts_with = "binning")]
    pub legend: Option<PathBuf>,

    /// Report areas in square metres instead of pixel counts
    #[arg(long)]
    pub area: bool,

    /// Print min/max/mean/std instead of a value count
    #[arg(long, conflicts_with_all = ["binning", "legend", "area"])]
    pub stats: bool,

    /// Layer kind of the inputs
    #[arg(long, value_enum, default_value = "categorical")]
    pub kind: KindArg,
}

/// Read and compile a legend JSON file.
pub fn load_legend(path: &Path) -> Result<Legend, CliError> {
    let text = std::fs::read_to_string(path).map_err(|error| CliError::FileRead {
        path: path.to_path_buf(),
        error,
    })?;
    Legend::from_json(&text).map_err(|error| CliError::Legend {
        path: path.to_path_buf(),
        error,
    })
}

/// Parse a `name=path` layer binding.
pub fn parse_binding(text: &str) -> Result<(String, PathBuf), String> {
    let (name, path) = text
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PATH, got '{}'", text))?;
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!("'{}' is not a valid variable name", name));
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(format!("variable name '{}' must not start with a digit", name));
    }
    Ok((name.to_string(), PathBuf::from(path.trim())))
}

/// Reject a layer name bound more than once.
pub fn check_unique_names(inputs: &[(String, PathBuf)]) -> Result<(), CliError> {
    let mut seen = BTreeSet::new();
    for (name, _) in inputs {
        if !seen.insert(name.as_str()) {
            return Err(CliError::InvalidArgument(format!(
                "layer name '{}' given more than once",
                name
            )));
        }
    }
    Ok(())
}

/// Open every raster as a layer and build its pyramid.
///
/// Layers get ids 1, 2, ... in the order given. Names are checked before any
/// raster is read.
pub async fn open_and_build(
    service: &TileService,
    inputs: &[(String, PathBuf)],
    kind: KindArg,
) -> Result<BTreeMap<String, LayerId>, CliError> {
    check_unique_names(inputs)?;
    let mut layers = BTreeMap::new();
    for (i, (name, path)) in inputs.iter().enumerate() {
        let id = LayerId(i as u64 + 1);
        service
            .open_layer(id, name.as_str(), kind.into(), path.clone())
            .await?;
        let report = service.build_layer(id, CancellationToken::new(), None).await?;
        tracing::info!(
            layer = name.as_str(),
            tiles = report.tiles_written,
            "Layer ready"
        );
        layers.insert(name.clone(), id);
    }
    Ok(layers)
}

/// Run a value count (or statistics) and print it as JSON.
pub async fn print_count(
    service: &TileService,
    layers: BTreeMap<String, LayerId>,
    formula: Option<&str>,
    args: &CountArgs,
) -> Result<(), CliError> {
    let mut aggregator = Aggregator::new(layers, formula)
        .map_err(|e| CliError::Service(e.into()))?
        .with_bucket_width(args.width.unwrap_or(service.config().aggregation.bucket_width));
    if let Some(zoom) = args.zoom {
        aggregator = aggregator.with_zoom(zoom);
    }

    let json = if args.stats {
        let stats = service.statistics(aggregator).await?;
        serde_json::to_string_pretty(&stats)
    } else {
        let grouping = match (&args.legend, args.binning) {
            (Some(path), _) => Grouping::Legend(Arc::new(load_legend(path)?)),
            (None, Some(BinningArg::Categorical)) => Grouping::Discrete,
            (None, Some(BinningArg::Continuous)) => Grouping::Continuous,
            (None, None) => match LayerKind::from(args.kind) {
                LayerKind::Categorical => Grouping::Discrete,
                LayerKind::Continuous => Grouping::Continuous,
            },
        };
        let counts = service
            .value_count(aggregator.with_grouping(grouping), args.area)
            .await?;
        serde_json::to_string_pretty(&counts)
    };
    let json = json.map_err(|e| CliError::InvalidArgument(format!("cannot print result: {}", e)))?;
    println!("{}", json);
    Ok(())
}
