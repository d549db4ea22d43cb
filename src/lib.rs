//! Terrain data access and streaming for chunked lunar DEM tiles.
//!
//! The dataset is a fixed grid of headerless binary tiles (row-major f32
//! elevation in kilometers, grouped into 512x512 chunks). [`TerrainLoader`]
//! maps a point of view onto the grid and keeps a resident elevation buffer
//! up to date with incremental scroll updates; [`TerrainTileCache`] memoizes
//! fully-sampled 1x1 degree patches for sphere rendering; [`ColorMapSampler`]
//! provides the parallel color lookup. Mesh and GPU work live downstream of
//! the buffers these types produce.

pub mod colormap;
pub mod dataset;
pub mod error;
pub mod loader;
pub mod stream;
pub mod tile_cache;

pub use colormap::ColorMapSampler;
pub use dataset::{find_tile, wrap_longitude, TileMetadata, CHUNK_SIZE, TILE_HEIGHT, TILE_WIDTH};
pub use error::{TerrainError, TerrainResult};
pub use loader::TerrainLoader;
pub use stream::TileStream;
pub use tile_cache::{TerrainTileCache, TileRequest, TileSample};
