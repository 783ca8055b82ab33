//! End-to-end: GeoTIFF on disk → pyramid → index → render / count.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use rastertile::aggregate::{AggregationEngine, Aggregator, Grouping};
use rastertile::coord::{tile_transform, LayerId, TileCoord, ZoomRange};
use rastertile::index::{LayerKind, MissReason, RasterLayer, TileIndex};
use rastertile::legend::Legend;
use rastertile::pyramid::{PyramidBuilder, PyramidConfig};
use rastertile::raster::{open, GeoTiffSource, RasterError, WGS84_SRID};
use rastertile::render::{PngEncoder, Renderer};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tokio_util::sync::CancellationToken;

/// 16x16 geographic raster over lon 0..90, lat 0..45: west half 1, east half 2,
/// with the south-west pixel set to nodata.
fn write_geographic_tiff(path: &Path) {
    let mut data = Vec::with_capacity(256);
    for row in 0..16 {
        for col in 0..16 {
            data.push(if col < 8 { 1u8 } else { 2u8 });
            if row == 15 && col == 0 {
                *data.last_mut().unwrap() = 255;
            }
        }
    }
    let file = File::create(path).unwrap();
    let mut encoder = TiffEncoder::new(file).unwrap();
    let mut image = encoder.new_image::<colortype::Gray8>(16, 16).unwrap();
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &[90.0f64 / 16.0, 45.0 / 16.0, 0.0][..])
        .unwrap();
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &[0.0f64, 0.0, 0.0, 0.0, 45.0, 0.0][..])
        .unwrap();
    image
        .encoder()
        .write_tag(
            Tag::GeoKeyDirectoryTag,
            &[1u16, 1, 0, 2, 1024, 0, 1, 2, 2048, 0, 1, 4326][..],
        )
        .unwrap();
    image.encoder().write_tag(Tag::GdalNodata, "255").unwrap();
    image.write_data(&data).unwrap();
}

fn build() -> (tempfile::TempDir, RasterLayer, TileIndex, PyramidBuilder) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("halves.tif");
    write_geographic_tiff(&path);

    let raster = open(&GeoTiffSource::new(&path)).unwrap();
    assert_eq!(raster.srid(), WGS84_SRID);
    let layer = RasterLayer::new(LayerId(1), "halves", LayerKind::Categorical, raster).unwrap();

    let index = TileIndex::new();
    let builder = PyramidBuilder::new(PyramidConfig::default().with_tile_size(16).with_workers(2)).unwrap();
    let report = builder
        .build(&layer, &index, &CancellationToken::new(), None)
        .unwrap();
    assert!(report.is_complete());
    assert!(report.tiles_written > 0);
    (dir, layer, index, builder)
}

#[test]
fn geographic_tiff_is_tiled_in_web_mercator() {
    let (_dir, layer, index, _builder) = build();

    let zoom_range = index.zoom_range(layer.id()).unwrap().unwrap();
    assert_eq!(zoom_range.min, 0);
    assert!(zoom_range.max >= 1);

    for zoom in zoom_range.iter() {
        let listing = index.list(layer.id(), zoom).unwrap();
        assert!(!listing.coords().is_empty());
        for tile in listing {
            assert_eq!(tile.raster().width(), 16);
            assert_eq!(tile.raster().height(), 16);
            assert_eq!(tile.raster().transform(), &tile_transform(&tile.coord(), 16));
            // Everything north-east of the origin; TMS rows grow north.
            let half = 1u32 << zoom >> 1;
            assert!(zoom == 0 || (tile.coord().x >= half && tile.coord().y >= half));
        }
    }

    // The south-west world quadrant is outside the layer.
    let south_west = TileCoord::new(1, 0, 0).unwrap();
    assert_eq!(
        index.explain_miss(layer.id(), south_west),
        Some(MissReason::OutsideExtent)
    );
    let too_deep = TileCoord::new(zoom_range.max + 1, 0, 0).unwrap();
    assert_eq!(
        index.explain_miss(layer.id(), too_deep),
        Some(MissReason::ZoomNotBuilt)
    );
}

#[test]
fn value_counts_only_see_valid_values() {
    let (_dir, layer, index, _builder) = build();
    let engine = AggregationEngine::new(2).unwrap();

    let layers = [("a".to_string(), layer.id())].into_iter().collect();
    let counts = Aggregator::new(layers, None)
        .unwrap()
        .value_count(&index, &engine, false)
        .unwrap();
    let keys: Vec<&str> = counts.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["1", "2"]);
    assert!(counts.values().all(|c| *c > 0.0));

    let legend = Legend::from_json(
        r##"{"title": "halves", "entries": [
            {"name": "West", "expression": "1", "color": "#00ff00", "code": 1},
            {"name": "Anything", "expression": "x > 0", "color": "#0000ff", "code": 2}
        ]}"##,
    )
    .unwrap();
    let layers = [("a".to_string(), layer.id())].into_iter().collect();
    let by_entry = Aggregator::new(layers, None)
        .unwrap()
        .with_grouping(Grouping::Legend(Arc::new(legend)))
        .value_count(&index, &engine, false)
        .unwrap();
    assert_eq!(by_entry["1"], counts["1"]);
    assert_eq!(by_entry["x > 0"], counts["2"]);
}

#[test]
fn rebuild_produces_identical_tiles() {
    let (_dir, layer, index, builder) = build();
    let snapshot = |index: &TileIndex| -> Vec<(TileCoord, Vec<f64>)> {
        let mut tiles = Vec::new();
        for zoom in index.zooms(layer.id()).unwrap() {
            for tile in index.list(layer.id(), zoom).unwrap() {
                tiles.push((tile.coord(), tile.band().unwrap().data().to_vec()));
            }
        }
        tiles
    };
    let before = snapshot(&index);
    let report = builder
        .build(&layer, &index, &CancellationToken::new(), None)
        .unwrap();
    assert_eq!(report.tiles_replaced, before.len());
    assert_eq!(snapshot(&index), before);
}

#[test]
fn tiles_render_to_png() {
    let (_dir, layer, index, _builder) = build();
    let legend = Legend::from_json(
        r##"{"title": "t", "entries": [{"name": "West", "expression": "1", "color": "#00ff00"}]}"##,
    )
    .unwrap();
    let renderer = Renderer::legend(Arc::new(legend));
    let tile = index
        .list(layer.id(), 0)
        .unwrap()
        .next()
        .expect("zoom 0 tile");
    let png = renderer.encode_tile(&tile, &PngEncoder).unwrap();
    let image = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (16, 16));
    // South-west quadrant of the world tile is outside the source.
    assert_eq!(image.get_pixel(0, 15).0, [0, 0, 0, 0]);
}

#[test]
fn cleared_layer_is_empty_but_registered() {
    let (_dir, layer, index, _builder) = build();
    let removed = index.clear_layer(layer.id()).unwrap();
    assert!(removed > 0);
    assert_eq!(index.tile_count(layer.id()).unwrap(), 0);
    assert_eq!(index.zoom_range(layer.id()).unwrap(), None::<ZoomRange>);
    assert!(index.layer_info(layer.id()).is_ok());
}

#[test]
fn memory_raster_cannot_back_a_layer() {
    let raster = rastertile::raster::MemorySource::new(
        1,
        1,
        rastertile::raster::GeoTransform::north_up(0.0, 1.0, 1.0, -1.0),
        WGS84_SRID,
        vec![rastertile::raster::Band::filled(
            rastertile::raster::DataType::UInt8,
            1,
            1,
            0.0,
            None,
        )],
    );
    let raster = open(&raster).unwrap();
    assert!(matches!(
        RasterLayer::new(LayerId(2), "memory", LayerKind::Continuous, raster),
        Err(RasterError::InvalidBackingStore)
    ));
}
