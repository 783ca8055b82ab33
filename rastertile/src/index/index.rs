//! TileIndex: in-memory store of built tiles.
//!
//! # Thread Safety
//!
//! - Layer registry: `RwLock` (writes only when a layer is registered)
//! - Tile access: one `DashMap` per layer (concurrent reads, per-shard write locks)
//!
//! Tiles are shared as `Arc<Tile>`. Overwriting a key swaps the `Arc`, so a
//! reader holding the previous tile keeps a consistent snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use super::{IndexError, LayerInfo, Tile};
use crate::coord::{self, LayerId, TileCoord, TileKey, ZoomRange};
use crate::raster::Extent;

struct LayerStore {
    info: RwLock<LayerInfo>,
    tiles: DashMap<TileCoord, Arc<Tile>>,
}

/// Why a tile lookup came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// The layer is not registered.
    UnknownLayer,
    /// The zoom level is outside the built range.
    ZoomNotBuilt,
    /// The tile does not overlap the layer extent.
    OutsideExtent,
    /// The tile should exist but was not produced (or was cleared).
    Missing,
}

/// Tiles of every registered layer.
pub struct TileIndex {
    layers: RwLock<HashMap<LayerId, Arc<LayerStore>>>,
}

impl TileIndex {
    pub fn new() -> Self {
        Self {
            layers: RwLock::new(HashMap::new()),
        }
    }

    fn store(&self, layer: LayerId) -> Result<Arc<LayerStore>, IndexError> {
        self.layers
            .read()
            .get(&layer)
            .cloned()
            .ok_or(IndexError::UnknownLayer(layer))
    }

    /// Register a layer, or replace the metadata of a registered one.
    ///
    /// Tiles of an already registered layer are kept.
    pub fn register_layer(&self, info: LayerInfo) {
        let mut layers = self.layers.write();
        match layers.get(&info.id) {
            Some(store) => *store.info.write() = info,
            None => {
                let id = info.id;
                layers.insert(
                    id,
                    Arc::new(LayerStore {
                        info: RwLock::new(info),
                        tiles: DashMap::new(),
                    }),
                );
            }
        }
    }

    /// Record the zoom levels a build produced.
    pub fn set_zoom_range(&self, layer: LayerId, range: Option<ZoomRange>) -> Result<(), IndexError> {
        self.store(layer)?.info.write().zoom_range = range;
        Ok(())
    }

    pub fn layer_info(&self, layer: LayerId) -> Result<LayerInfo, IndexError> {
        Ok(self.store(layer)?.info.read().clone())
    }

    pub fn layers(&self) -> Vec<LayerId> {
        let mut ids: Vec<LayerId> = self.layers.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn zoom_range(&self, layer: LayerId) -> Result<Option<ZoomRange>, IndexError> {
        Ok(self.store(layer)?.info.read().zoom_range)
    }

    pub fn extent(&self, layer: LayerId) -> Result<Extent, IndexError> {
        Ok(self.store(layer)?.info.read().extent)
    }

    /// Store a tile, returning the one it replaced.
    pub fn insert(&self, tile: Tile) -> Result<Option<Arc<Tile>>, IndexError> {
        let key = tile.key();
        let store = self.store(key.layer)?;
        let tile_size = store.info.read().tile_size;
        let (width, height) = (tile.raster().width(), tile.raster().height());
        if width != tile_size as usize || height != tile_size as usize {
            return Err(IndexError::InvalidTileShape {
                key,
                width,
                height,
                tile_size,
            });
        }
        Ok(store.tiles.insert(key.coord, Arc::new(tile)))
    }

    pub fn lookup(&self, layer: LayerId, coord: TileCoord) -> Result<Arc<Tile>, IndexError> {
        self.store(layer)?
            .tiles
            .get(&coord)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(IndexError::NotFound(TileKey::new(layer, coord)))
    }

    pub fn contains(&self, layer: LayerId, coord: TileCoord) -> bool {
        self.store(layer)
            .map(|store| store.tiles.contains_key(&coord))
            .unwrap_or(false)
    }

    /// Tile covering a world point (pyramid SRS) at `zoom`.
    pub fn lookup_point(
        &self,
        layer: LayerId,
        zoom: u8,
        x: f64,
        y: f64,
    ) -> Result<Arc<Tile>, IndexError> {
        let coord =
            coord::tile_for_point(x, y, zoom).ok_or(IndexError::OutsideGrid { zoom, x, y })?;
        self.lookup(layer, coord)
    }

    /// Stored tiles at `zoom` overlapping `extent`, ordered by `(x, y)`.
    pub fn lookup_window(
        &self,
        layer: LayerId,
        zoom: u8,
        extent: &Extent,
    ) -> Result<Vec<Arc<Tile>>, IndexError> {
        let store = self.store(layer)?;
        let Some(range) = coord::tile_range_for_extent(extent, zoom) else {
            return Ok(Vec::new());
        };

        let mut tiles: Vec<Arc<Tile>> = if range.len() <= store.tiles.len() {
            range
                .iter()
                .filter_map(|c| store.tiles.get(&c).map(|e| Arc::clone(e.value())))
                .collect()
        } else {
            store
                .tiles
                .iter()
                .filter(|e| range.contains(e.key()))
                .map(|e| Arc::clone(e.value()))
                .collect()
        };
        tiles.sort_by_key(|t| (t.coord().x, t.coord().y));
        Ok(tiles)
    }

    /// Lazy listing of the tiles of one zoom level.
    ///
    /// The set of keys is captured now; tiles are fetched while iterating.
    pub fn list(&self, layer: LayerId, zoom: u8) -> Result<TileListing, IndexError> {
        let store = self.store(layer)?;
        let mut coords: Vec<TileCoord> = store
            .tiles
            .iter()
            .map(|e| *e.key())
            .filter(|c| c.zoom == zoom)
            .collect();
        coords.sort_by_key(|c| (c.x, c.y));
        Ok(TileListing {
            store,
            coords: Arc::from(coords),
            position: 0,
        })
    }

    /// Zoom levels holding at least one tile, ascending.
    pub fn zooms(&self, layer: LayerId) -> Result<Vec<u8>, IndexError> {
        let store = self.store(layer)?;
        let mut zooms: Vec<u8> = store.tiles.iter().map(|e| e.key().zoom).collect();
        zooms.sort_unstable();
        zooms.dedup();
        Ok(zooms)
    }

    pub fn tile_count(&self, layer: LayerId) -> Result<usize, IndexError> {
        Ok(self.store(layer)?.tiles.len())
    }

    /// Drop every tile of a layer, keeping it registered with no zoom range.
    ///
    /// Returns the number of tiles removed.
    pub fn clear_layer(&self, layer: LayerId) -> Result<usize, IndexError> {
        let store = self.store(layer)?;
        let removed = store.tiles.len();
        store.tiles.clear();
        store.info.write().zoom_range = None;
        Ok(removed)
    }

    /// Explain why `coord` has no tile, or `None` if it has one.
    ///
    /// Misses are never filled in by synthesising a tile.
    pub fn explain_miss(&self, layer: LayerId, coord: TileCoord) -> Option<MissReason> {
        let Ok(store) = self.store(layer) else {
            return Some(MissReason::UnknownLayer);
        };
        if store.tiles.contains_key(&coord) {
            return None;
        }
        let info = store.info.read();
        match info.zoom_range {
            Some(range) if range.contains(coord.zoom) => {}
            _ => return Some(MissReason::ZoomNotBuilt),
        }
        let covered = coord::tile_range_for_extent(&info.extent, coord.zoom)
            .is_some_and(|range| range.contains(&coord));
        if covered {
            Some(MissReason::Missing)
        } else {
            Some(MissReason::OutsideExtent)
        }
    }
}

impl Default for TileIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Restartable listing of one zoom level of a layer.
///
/// Cloning or calling [`TileListing::restart`] replays the same keys.
/// Tiles removed after the listing was taken are skipped.
#[derive(Clone)]
pub struct TileListing {
    store: Arc<LayerStore>,
    coords: Arc<[TileCoord]>,
    position: usize,
}

impl TileListing {
    /// Keys captured when the listing was taken.
    pub fn coords(&self) -> &[TileCoord] {
        &self.coords
    }

    pub fn restart(&mut self) {
        self.position = 0;
    }
}

impl Iterator for TileListing {
    type Item = Arc<Tile>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(coord) = self.coords.get(self.position) {
            self.position += 1;
            if let Some(entry) = self.store.tiles.get(coord) {
                return Some(Arc::clone(entry.value()));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.coords.len() - self.position))
    }
}
