//! `rastertile tiles`: build a pyramid and write it out as PNG tiles.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use rastertile::aggregate::Aggregator;
use rastertile::coord::LayerId;
use rastertile::index::LayerKind;
use rastertile::legend::Rgba;
use rastertile::pyramid::ProgressCallback;
use rastertile::render::{Gradient, Renderer, Style};
use rastertile::service::{ServiceError, TileService};
use tokio_util::sync::CancellationToken;

use super::common::{load_legend, KindArg};
use crate::error::CliError;

fn make_progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tiles")
    {
        bar.set_style(style.progress_chars("=>-"));
    }
    bar
}

/// Legend rendering when a legend is given, otherwise a grey ramp over the
/// layer's value range.
async fn renderer_for(
    service: &TileService,
    id: LayerId,
    legend: Option<&Path>,
    kind: LayerKind,
) -> Result<Option<Renderer>, CliError> {
    let renderer = match (legend, kind) {
        (Some(path), LayerKind::Categorical) => Renderer::legend(Arc::new(load_legend(path)?)),
        (Some(path), LayerKind::Continuous) => Renderer::gradient(&load_legend(path)?)?,
        (None, _) => {
            let layers = [("x".to_string(), id)].into_iter().collect();
            let aggregator = Aggregator::new(layers, None).map_err(ServiceError::from)?;
            let Some(stats) = service.statistics(aggregator).await? else {
                return Ok(None);
            };
            let ramp = vec![
                (stats.min, Rgba::opaque(0, 0, 0)),
                (stats.max, Rgba::opaque(255, 255, 255)),
            ];
            match Gradient::new(ramp) {
                Some(gradient) => Renderer::new(Style::Gradient(gradient), Default::default()),
                None => return Ok(None),
            }
        }
    };
    Ok(Some(renderer.with_config(service.config().render)))
}

pub async fn run(
    service: &TileService,
    raster: PathBuf,
    out: PathBuf,
    legend: Option<PathBuf>,
    kind: KindArg,
) -> Result<(), CliError> {
    let id = LayerId(1);
    service
        .open_layer(id, raster.display().to_string(), kind.into(), raster.clone())
        .await?;
    let plan = service.plan_layer(id)?;

    let bar = make_progress_bar(plan.tile_count() as u64);
    let tick = bar.clone();
    let progress: Arc<ProgressCallback> =
        Arc::new(move |done: usize, _total: usize| tick.set_position(done as u64));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let report = service.build_layer(id, cancel, Some(progress)).await?;
    bar.finish_and_clear();
    for failure in &report.failures {
        eprintln!("Skipped tile {}: {}", failure.coord, failure.reason);
    }
    if report.cancelled {
        eprintln!("Interrupted; writing the {} tiles built so far", report.tiles_written);
    }

    let Some(renderer) = renderer_for(service, id, legend.as_deref(), kind.into()).await? else {
        println!("Layer holds no valid pixels; nothing to write");
        return Ok(());
    };

    let index = service.index();
    let mut written = 0usize;
    for zoom in index.zooms(id).map_err(ServiceError::from)? {
        let listing = index.list(id, zoom).map_err(ServiceError::from)?;
        for &coord in listing.coords() {
            let png = service.render_png(id, coord, renderer.clone()).await?;
            let dir = out.join(coord.zoom.to_string()).join(coord.x.to_string());
            std::fs::create_dir_all(&dir).map_err(|error| CliError::FileWrite {
                path: dir.clone(),
                error,
            })?;
            let path = dir.join(format!("{}.png", coord.y));
            std::fs::write(&path, png).map_err(|error| CliError::FileWrite { path, error })?;
            written += 1;
        }
    }

    println!(
        "Wrote {} tiles (zoom {}) to {}",
        written,
        report
            .zoom_range
            .map(|r| format!("{}..={}", r.min, r.max))
            .unwrap_or_else(|| "none".to_string()),
        out.display()
    );
    Ok(())
}
