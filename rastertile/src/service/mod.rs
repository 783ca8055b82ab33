//! Async facade over the engine.
//!
//! Every operation that decodes, warps, evaluates or encodes pixels runs on
//! tokio's blocking pool via `spawn_blocking`; index lookups are answered
//! inline. Parallelism inside an operation comes from the builder's and the
//! aggregation engine's own rayon pools.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::aggregate::{AggregateError, AggregationEngine, Aggregator, Statistics};
use crate::algebra::{AlgebraError, RasterAlgebra};
use crate::config::EngineConfig;
use crate::coord::{LayerId, TileCoord};
use crate::index::{IndexError, LayerKind, RasterLayer, Tile, TileIndex};
use crate::pyramid::{BuildError, BuildPlan, BuildReport, ProgressCallback, PyramidBuilder};
use crate::raster::{open, GeoTiffSource, RasterError};
use crate::render::{PngEncoder, RenderError, Renderer};

/// Errors surfaced by [`TileService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Layer {0} has not been added to the service")]
    UnknownLayer(LayerId),

    #[error("Blocking task failed: {0}")]
    Join(#[from] JoinError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Algebra(#[from] AlgebraError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

async fn blocking<T, F>(work: F) -> Result<T, ServiceError>
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// Layers, their tile index, and the engines that work on them.
///
/// Cheap to share behind an `Arc`; all state is internally synchronised.
pub struct TileService {
    config: EngineConfig,
    index: Arc<TileIndex>,
    builder: Arc<PyramidBuilder>,
    engine: Arc<AggregationEngine>,
    layers: RwLock<HashMap<LayerId, RasterLayer>>,
}

impl TileService {
    pub fn new(config: EngineConfig) -> Result<Self, ServiceError> {
        let builder = PyramidBuilder::new(config.pyramid.clone())?;
        let engine = AggregationEngine::new(config.aggregation.workers)?;
        Ok(Self {
            config,
            index: Arc::new(TileIndex::new()),
            builder: Arc::new(builder),
            engine: Arc::new(engine),
            layers: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<TileIndex> {
        &self.index
    }

    /// Register a layer so it can be built.
    pub fn add_layer(&self, layer: RasterLayer) {
        info!(layer = %layer.id(), name = layer.name(), kind = %layer.kind(), "Layer added");
        self.layers.write().insert(layer.id(), layer);
    }

    /// Decode a GeoTIFF and register it as a layer.
    pub async fn open_layer(
        &self,
        id: LayerId,
        name: impl Into<String>,
        kind: LayerKind,
        path: impl Into<PathBuf>,
    ) -> Result<(), ServiceError> {
        let source = GeoTiffSource::new(path);
        let raster = blocking(move || Ok(open(&source)?)).await?;
        self.add_layer(RasterLayer::new(id, name, kind, raster)?);
        Ok(())
    }

    /// A copy of a registered layer.
    pub fn layer(&self, id: LayerId) -> Result<RasterLayer, ServiceError> {
        self.layers
            .read()
            .get(&id)
            .cloned()
            .ok_or(ServiceError::UnknownLayer(id))
    }

    /// Build (or rebuild) the pyramid of a layer.
    pub async fn build_layer(
        &self,
        id: LayerId,
        cancel: CancellationToken,
        progress: Option<Arc<ProgressCallback>>,
    ) -> Result<BuildReport, ServiceError> {
        let layer = self.layer(id)?;
        let builder = Arc::clone(&self.builder);
        let index = Arc::clone(&self.index);
        blocking(move || Ok(builder.build(&layer, &index, &cancel, progress.as_deref())?)).await
    }

    /// Zoom levels and tile counts a build of the layer would produce.
    pub fn plan_layer(&self, id: LayerId) -> Result<BuildPlan, ServiceError> {
        let layer = self.layer(id)?;
        Ok(self.builder.plan(layer.raster())?)
    }

    /// Drop every tile of a layer, returning how many were removed.
    pub fn clear_layer(&self, id: LayerId) -> Result<usize, ServiceError> {
        Ok(self.index.clear_layer(id)?)
    }

    pub fn tile(&self, id: LayerId, coord: TileCoord) -> Result<Arc<Tile>, ServiceError> {
        Ok(self.index.lookup(id, coord)?)
    }

    /// Render one tile as PNG.
    pub async fn render_png(
        &self,
        id: LayerId,
        coord: TileCoord,
        renderer: Renderer,
    ) -> Result<Vec<u8>, ServiceError> {
        let tile = self.tile(id, coord)?;
        let renderer = renderer.with_config(self.config.render);
        blocking(move || Ok(renderer.encode_tile(&tile, &PngEncoder)?)).await
    }

    /// Evaluate a formula on one tile position. The result is not indexed.
    pub async fn algebra_tile(
        &self,
        formula: &str,
        bindings: BTreeMap<String, LayerId>,
        coord: TileCoord,
    ) -> Result<Tile, ServiceError> {
        let algebra = RasterAlgebra::parse(formula)?;
        let tiles = bindings
            .into_iter()
            .map(|(name, layer)| -> Result<(String, Arc<Tile>), ServiceError> {
                Ok((name, self.tile(layer, coord)?))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        blocking(move || Ok(algebra.evaluate_tiles(&tiles)?)).await
    }

    /// Value count; areas in squared metres when `area` is set.
    pub async fn value_count(
        &self,
        aggregator: Aggregator,
        area: bool,
    ) -> Result<BTreeMap<String, f64>, ServiceError> {
        let index = Arc::clone(&self.index);
        let engine = Arc::clone(&self.engine);
        blocking(move || Ok(aggregator.value_count(&index, &engine, area)?)).await
    }

    pub async fn statistics(&self, aggregator: Aggregator) -> Result<Option<Statistics>, ServiceError> {
        let index = Arc::clone(&self.index);
        let engine = Arc::clone(&self.engine);
        blocking(move || Ok(aggregator.statistics(&index, &engine)?)).await
    }
}
