//! `rastertile info`: describe a raster and the pyramid it would produce.

use std::path::PathBuf;

use rastertile::coord::LayerId;
use rastertile::service::TileService;

use super::common::KindArg;
use crate::error::CliError;

pub async fn run(service: &TileService, raster: PathBuf, kind: KindArg) -> Result<(), CliError> {
    let id = LayerId(1);
    service
        .open_layer(id, raster.display().to_string(), kind.into(), raster.clone())
        .await?;
    let layer = service.layer(id)?;
    let plan = service.plan_layer(id)?;
    let r = layer.raster();

    println!("Raster: {}", raster.display());
    println!("  Size:       {} x {} pixels", r.width(), r.height());
    println!("  Bands:      {}", r.band_count());
    for (i, band) in r.bands().iter().enumerate() {
        let nodata = band
            .nodata()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "none".to_string());
        println!("    #{}: {} (nodata: {})", i, band.dtype(), nodata);
    }
    println!("  SRID:       EPSG:{}", r.srid());
    let e = r.extent();
    println!("  Extent:     {} {} {} {}", e.min_x, e.min_y, e.max_x, e.max_y);
    println!();

    let config = &service.config().pyramid;
    println!(
        "Pyramid ({}x{} tiles, zoom policy {}, {} resampling):",
        config.tile_size,
        config.tile_size,
        config.zoom_policy,
        config.resampling_for(layer.kind())
    );
    println!("  Pixel size: {:.3} m", plan.pixel_size);
    println!("  Zoom range: {}..={}", plan.zoom_range.min, plan.zoom_range.max);
    for range in &plan.ranges {
        println!(
            "    z{:<2} x {}..={}  y {}..={}  ({} tiles)",
            range.zoom,
            range.min_x,
            range.max_x,
            range.min_y,
            range.max_y,
            range.len()
        );
    }
    println!("  Total:      {} tiles", plan.tile_count());
    Ok(())
}
