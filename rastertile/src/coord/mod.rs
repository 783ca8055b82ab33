//! TMS tile math
//!
//! Converts between Web Mercator world coordinates (EPSG:3857) and tile
//! addresses of the global quad-tree grid. Tiles are addressed TMS-style:
//! rows count northward from the southern edge of the grid.

mod types;

pub use types::{
    tiles_per_side, CoordError, LayerId, TileCoord, TileKey, TileRange, ZoomRange,
    DEFAULT_TILE_SIZE, MAX_ZOOM, MIN_ZOOM,
};

use crate::raster::srs::HALF_WORLD;
use crate::raster::{Extent, GeoTransform};

/// Width (and height) of the square Web Mercator world in metres.
pub const WORLD_SIZE: f64 = 2.0 * HALF_WORLD;

/// Relative slack when comparing pixel sizes across zoom levels.
const RESOLUTION_EPSILON: f64 = 1e-9;

/// Overlap, as a fraction of a tile, below which a tile is not selected.
const EDGE_EPSILON: f64 = 1e-9;

/// Checks that a tile size is a non-zero power of two.
pub fn validate_tile_size(tile_size: u32) -> Result<(), CoordError> {
    if tile_size == 0 || !tile_size.is_power_of_two() {
        return Err(CoordError::InvalidTileSize(tile_size));
    }
    Ok(())
}

/// Ground size of one tile edge at `zoom`, in metres.
#[inline]
pub fn tile_span(zoom: u8) -> f64 {
    WORLD_SIZE / tiles_per_side(zoom) as f64
}

/// Pixel size at `zoom` for tiles of `tile_size` pixels.
///
/// # Arguments
///
/// * `zoom` - Zoom level (0 to 22)
/// * `tile_size` - Tile edge length in pixels
#[inline]
pub fn resolution(zoom: u8, tile_size: u32) -> f64 {
    tile_span(zoom) / tile_size as f64
}

/// World bounding box of a tile.
#[inline]
pub fn tile_bounds(coord: &TileCoord) -> Extent {
    let span = tile_span(coord.zoom);
    let min_x = -HALF_WORLD + coord.x as f64 * span;
    let min_y = -HALF_WORLD + coord.y as f64 * span;
    Extent::new(min_x, min_y, min_x + span, min_y + span)
}

/// North-up geotransform of a tile of `tile_size` pixels.
///
/// Pixel (0, 0) is the north-west corner of the tile footprint.
pub fn tile_transform(coord: &TileCoord, tile_size: u32) -> GeoTransform {
    let bounds = tile_bounds(coord);
    let res = resolution(coord.zoom, tile_size);
    GeoTransform::north_up(bounds.min_x, bounds.max_y, res, -res)
}

/// Tile containing a world point at `zoom`.
///
/// Points on the eastern or northern edge of the world belong to the last
/// tile. Returns `None` for points outside the world or for invalid zooms.
pub fn tile_for_point(x: f64, y: f64, zoom: u8) -> Option<TileCoord> {
    if zoom > MAX_ZOOM || !(-HALF_WORLD..=HALF_WORLD).contains(&x) {
        return None;
    }
    if !(-HALF_WORLD..=HALF_WORLD).contains(&y) {
        return None;
    }
    let last = tiles_per_side(zoom) - 1;
    let span = tile_span(zoom);
    let tx = (((x + HALF_WORLD) / span).floor() as u32).min(last);
    let ty = (((y + HALF_WORLD) / span).floor() as u32).min(last);
    Some(TileCoord { zoom, x: tx, y: ty })
}

/// Range of tiles at `zoom` whose footprints overlap `extent`.
///
/// The extent is clipped to the world first. Tiles that only touch the
/// extent along an edge are not included, except for degenerate extents
/// (zero width or height) which select the tiles containing them. Slivers
/// thinner than a billionth of a tile, as left by rounding in
/// reprojection, count as touching.
pub fn tile_range_for_extent(extent: &Extent, zoom: u8) -> Option<TileRange> {
    if zoom > MAX_ZOOM {
        return None;
    }
    let min_x = extent.min_x.max(-HALF_WORLD);
    let min_y = extent.min_y.max(-HALF_WORLD);
    let max_x = extent.max_x.min(HALF_WORLD);
    let max_y = extent.max_y.min(HALF_WORLD);
    if !(min_x <= max_x && min_y <= max_y) {
        return None;
    }

    let last = tiles_per_side(zoom) as f64 - 1.0;
    let span = tile_span(zoom);
    let lower = |v: f64| ((v + HALF_WORLD) / span + EDGE_EPSILON).floor().clamp(0.0, last);
    let upper =
        |lo: f64, v: f64| (((v + HALF_WORLD) / span - EDGE_EPSILON).ceil() - 1.0).clamp(lo, last);

    let tx0 = lower(min_x);
    let ty0 = lower(min_y);
    Some(TileRange {
        zoom,
        min_x: tx0 as u32,
        min_y: ty0 as u32,
        max_x: upper(tx0, max_x) as u32,
        max_y: upper(ty0, max_y) as u32,
    })
}

/// Smallest zoom whose pixel size is at most `pixel_size`.
///
/// Building at this zoom never loses source detail; it may upsample.
/// Capped at [`MAX_ZOOM`].
pub fn native_zoom(pixel_size: f64, tile_size: u32) -> u8 {
    let threshold = pixel_size * (1.0 + RESOLUTION_EPSILON);
    (MIN_ZOOM..=MAX_ZOOM)
        .find(|z| resolution(*z, tile_size) <= threshold)
        .unwrap_or(MAX_ZOOM)
}

/// Largest zoom whose pixel size is at least `pixel_size`.
///
/// Building at this zoom never upsamples the source. Sources coarser than
/// the whole world at zoom 0 get zoom 0.
pub fn zoom_down(pixel_size: f64, tile_size: u32) -> u8 {
    let threshold = pixel_size * (1.0 - RESOLUTION_EPSILON);
    (MIN_ZOOM..=MAX_ZOOM)
        .rev()
        .find(|z| resolution(*z, tile_size) >= threshold)
        .unwrap_or(MIN_ZOOM)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_resolution_at_zoom_0() {
        // 40075016.68 / 256
        assert!(close(resolution(0, 256), 156_543.033_928_041));
        assert!(close(resolution(1, 256), resolution(0, 256) / 2.0));
        assert!(close(resolution(0, 512), resolution(1, 256)));
    }

    #[test]
    fn test_tile_bounds_zoom_0_is_world() {
        let bounds = tile_bounds(&TileCoord { zoom: 0, x: 0, y: 0 });
        assert!(close(bounds.min_x, -HALF_WORLD));
        assert!(close(bounds.min_y, -HALF_WORLD));
        assert!(close(bounds.max_x, HALF_WORLD));
        assert!(close(bounds.max_y, HALF_WORLD));
    }

    #[test]
    fn test_tms_rows_grow_north() {
        let south = tile_bounds(&TileCoord { zoom: 1, x: 0, y: 0 });
        let north = tile_bounds(&TileCoord { zoom: 1, x: 0, y: 1 });
        assert!(close(south.max_y, 0.0));
        assert!(close(north.min_y, 0.0));
        assert!(north.max_y > south.max_y);
    }

    #[test]
    fn test_tile_transform_matches_bounds() {
        let coord = TileCoord { zoom: 4, x: 3, y: 9 };
        let transform = tile_transform(&coord, 256);
        let bounds = tile_bounds(&coord);
        let (x0, y0) = transform.pixel_to_world(0.0, 0.0);
        let (x1, y1) = transform.pixel_to_world(256.0, 256.0);
        assert!(close(x0, bounds.min_x) && close(y0, bounds.max_y));
        assert!(close(x1, bounds.max_x) && close(y1, bounds.min_y));
    }

    #[test]
    fn test_tile_for_point() {
        assert_eq!(
            tile_for_point(1.0, 1.0, 1),
            Some(TileCoord { zoom: 1, x: 1, y: 1 })
        );
        assert_eq!(
            tile_for_point(-1.0, -1.0, 1),
            Some(TileCoord { zoom: 1, x: 0, y: 0 })
        );
        assert_eq!(
            tile_for_point(HALF_WORLD, HALF_WORLD, 2),
            Some(TileCoord { zoom: 2, x: 3, y: 3 })
        );
        assert_eq!(tile_for_point(HALF_WORLD * 1.01, 0.0, 2), None);
        assert_eq!(tile_for_point(0.0, 0.0, 23), None);
    }

    #[test]
    fn test_range_excludes_edge_touching_tiles() {
        // Exactly the south-west quadrant at zoom 1.
        let extent = Extent::new(-HALF_WORLD, -HALF_WORLD, 0.0, 0.0);
        let range = tile_range_for_extent(&extent, 1).unwrap();
        assert_eq!((range.min_x, range.max_x, range.min_y, range.max_y), (0, 0, 0, 0));

        let range = tile_range_for_extent(&extent, 2).unwrap();
        assert_eq!((range.min_x, range.max_x, range.min_y, range.max_y), (0, 1, 0, 1));
    }

    #[test]
    fn test_range_ignores_rounding_slivers() {
        let extent = Extent::new(0.0, -1e-3, HALF_WORLD / 2.0 + 1e-3, HALF_WORLD / 2.0);
        let range = tile_range_for_extent(&extent, 2).unwrap();
        assert_eq!((range.min_x, range.max_x, range.min_y, range.max_y), (2, 2, 2, 2));
    }

    #[test]
    fn test_range_clips_to_world() {
        let extent = Extent::new(-1e9, -1e9, 1e9, 1e9);
        let range = tile_range_for_extent(&extent, 3).unwrap();
        assert_eq!(range.len(), 64);
        let outside = Extent::new(HALF_WORLD * 2.0, 0.0, HALF_WORLD * 3.0, 1.0);
        assert_eq!(tile_range_for_extent(&outside, 3), None);
    }

    #[test]
    fn test_range_of_point_extent() {
        let extent = Extent::new(10.0, 10.0, 10.0, 10.0);
        let range = tile_range_for_extent(&extent, 5).unwrap();
        assert_eq!(range.len(), 1);
        assert_eq!(range.iter().next(), tile_for_point(10.0, 10.0, 5));
    }

    #[test]
    fn test_native_and_down_zoom() {
        let res10 = resolution(10, 256);
        assert_eq!(native_zoom(res10, 256), 10);
        assert_eq!(zoom_down(res10, 256), 10);

        // Between zoom 10 and 11.
        let between = res10 * 0.75;
        assert_eq!(native_zoom(between, 256), 11);
        assert_eq!(zoom_down(between, 256), 10);

        assert_eq!(native_zoom(1e-6, 256), MAX_ZOOM);
        assert_eq!(zoom_down(1e9, 256), 0);
    }

    #[test]
    fn test_validate_tile_size() {
        assert!(validate_tile_size(256).is_ok());
        assert!(validate_tile_size(512).is_ok());
        assert_eq!(validate_tile_size(0), Err(CoordError::InvalidTileSize(0)));
        assert_eq!(validate_tile_size(300), Err(CoordError::InvalidTileSize(300)));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_point_lies_in_its_tile(
                x in -HALF_WORLD..HALF_WORLD,
                y in -HALF_WORLD..HALF_WORLD,
                zoom in 0u8..=MAX_ZOOM
            ) {
                let tile = tile_for_point(x, y, zoom).unwrap();
                let b = tile_bounds(&tile);
                let slack = Extent::new(b.min_x - 1e-6, b.min_y - 1e-6, b.max_x + 1e-6, b.max_y + 1e-6);
                prop_assert!(slack.contains(x, y), "{} not in {}", tile, b);
            }

            #[test]
            fn test_xyz_roundtrip(zoom in 0u8..=MAX_ZOOM, fx in 0.0..1.0_f64, fy in 0.0..1.0_f64) {
                let n = tiles_per_side(zoom);
                let x = ((fx * n as f64) as u32).min(n - 1);
                let y = ((fy * n as f64) as u32).min(n - 1);
                let tile = TileCoord::from_xyz(zoom, x, y)?;
                prop_assert_eq!(tile.to_xyz(), (zoom, x, y));
                prop_assert_eq!(tile.y, n - 1 - y);
            }

            #[test]
            fn test_range_covers_extent(
                x0 in -HALF_WORLD..HALF_WORLD,
                y0 in -HALF_WORLD..HALF_WORLD,
                w in 1.0..1e6_f64,
                h in 1.0..1e6_f64,
                zoom in 0u8..=12
            ) {
                let extent = Extent::new(x0, y0, (x0 + w).min(HALF_WORLD), (y0 + h).min(HALF_WORLD));
                let range = tile_range_for_extent(&extent, zoom).unwrap();
                // Every selected tile overlaps, and both corners are covered.
                for tile in range.iter() {
                    prop_assert!(tile_bounds(&tile).intersects(&extent));
                }
                let sw = tile_for_point(extent.min_x, extent.min_y, zoom).unwrap();
                prop_assert!(range.contains(&sw));
            }
        }
    }
}
