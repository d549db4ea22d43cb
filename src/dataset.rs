//! Static registry of the chunked SLDEM2015 elevation tiles.
//!
//! The dataset covers latitudes [-60, 60] in four 30-degree bands, each split
//! into eight 45-degree longitude tiles. Every tile is a headerless row-major
//! f32 raster of `TILE_WIDTH` x `TILE_HEIGHT` samples (kilometers), stored as
//! a sequence of `CHUNK_SIZE` x `CHUNK_SIZE` blocks so a single chunk can be
//! fetched with one seek and one read.

use crate::error::{TerrainError, TerrainResult};

/// Edge length of one square chunk, in samples.
pub const CHUNK_SIZE: i64 = 512;
/// Tile raster width in samples.
pub const TILE_WIDTH: i64 = 23040;
/// Tile raster height in samples.
pub const TILE_HEIGHT: i64 = 15360;
/// Chunk grid dimensions per tile.
pub const NUM_CHUNKS_X: i64 = TILE_WIDTH / CHUNK_SIZE;
pub const NUM_CHUNKS_Y: i64 = TILE_HEIGHT / CHUNK_SIZE;

/// Covered latitude band of the dataset, degrees.
pub const MIN_LATITUDE: f64 = -60.0;
pub const MAX_LATITUDE: f64 = 60.0;

const LONGITUDE_WRAP: f64 = 360.0;
const LATITUDE_EPSILON: f64 = 1e-6;

/// One geographic tile: its file (relative to the data root) and its
/// lat/lon bounding box in degrees. Longitudes live in [0, 360);
/// `min_longitude > max_longitude` encodes a tile spanning the 360/0 seam.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileMetadata {
    pub filename: &'static str,
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl TileMetadata {
    /// Longitude extent in degrees, always positive after wrap correction.
    pub fn longitude_span(&self) -> f64 {
        let span = self.max_longitude - self.min_longitude;
        if span <= 0.0 {
            span + LONGITUDE_WRAP
        } else {
            span
        }
    }

    /// Latitude extent in degrees.
    pub fn latitude_span(&self) -> f64 {
        self.max_latitude - self.min_latitude
    }

    fn contains_longitude(&self, lon: f64) -> bool {
        if self.min_longitude <= self.max_longitude {
            lon >= self.min_longitude && lon <= self.max_longitude
        } else {
            lon >= self.min_longitude || lon <= self.max_longitude
        }
    }

    /// Degrees east of the tile's western edge for `lon_degrees`, clamped
    /// into `[0, longitude_span]`. Handles seam-spanning tiles.
    pub fn longitude_offset(&self, lon_degrees: f64) -> f64 {
        let lon = wrap_longitude(lon_degrees);
        let mut delta = lon - self.min_longitude;
        if self.min_longitude > self.max_longitude && delta < 0.0 {
            delta += LONGITUDE_WRAP;
        }
        delta.clamp(0.0, self.longitude_span())
    }
}

/// Wrap a longitude into [0, 360).
pub fn wrap_longitude(lon_degrees: f64) -> f64 {
    let wrapped = lon_degrees % LONGITUDE_WRAP;
    if wrapped < 0.0 {
        wrapped + LONGITUDE_WRAP
    } else {
        wrapped
    }
}

const fn tile(
    filename: &'static str,
    min_latitude: f64,
    max_latitude: f64,
    min_longitude: f64,
    max_longitude: f64,
) -> TileMetadata {
    TileMetadata {
        filename,
        min_latitude,
        max_latitude,
        min_longitude,
        max_longitude,
    }
}

/// The fixed tile table. Linear scan is fine at this size.
pub const TILES: &[TileMetadata] = &[
    tile("proc/SLDEM2015_512_60S_30S_000_045_CHUNKED_512.DAT", -60.0, -30.0, 0.0, 45.0),
    tile("proc/SLDEM2015_512_60S_30S_045_090_CHUNKED_512.DAT", -60.0, -30.0, 45.0, 90.0),
    tile("proc/SLDEM2015_512_60S_30S_090_135_CHUNKED_512.DAT", -60.0, -30.0, 90.0, 135.0),
    tile("proc/SLDEM2015_512_60S_30S_135_180_CHUNKED_512.DAT", -60.0, -30.0, 135.0, 180.0),
    tile("proc/SLDEM2015_512_60S_30S_180_225_CHUNKED_512.DAT", -60.0, -30.0, 180.0, 225.0),
    tile("proc/SLDEM2015_512_60S_30S_225_270_CHUNKED_512.DAT", -60.0, -30.0, 225.0, 270.0),
    tile("proc/SLDEM2015_512_60S_30S_270_315_CHUNKED_512.DAT", -60.0, -30.0, 270.0, 315.0),
    tile("proc/SLDEM2015_512_60S_30S_315_360_CHUNKED_512.DAT", -60.0, -30.0, 315.0, 360.0),
    tile("proc/SLDEM2015_512_30S_00S_000_045_CHUNKED_512.DAT", -30.0, 0.0, 0.0, 45.0),
    tile("proc/SLDEM2015_512_30S_00S_045_090_CHUNKED_512.DAT", -30.0, 0.0, 45.0, 90.0),
    tile("proc/SLDEM2015_512_30S_00S_090_135_CHUNKED_512.DAT", -30.0, 0.0, 90.0, 135.0),
    tile("proc/SLDEM2015_512_30S_00S_135_180_CHUNKED_512.DAT", -30.0, 0.0, 135.0, 180.0),
    tile("proc/SLDEM2015_512_30S_00S_180_225_CHUNKED_512.DAT", -30.0, 0.0, 180.0, 225.0),
    tile("proc/SLDEM2015_512_30S_00S_225_270_CHUNKED_512.DAT", -30.0, 0.0, 225.0, 270.0),
    tile("proc/SLDEM2015_512_30S_00S_270_315_CHUNKED_512.DAT", -30.0, 0.0, 270.0, 315.0),
    tile("proc/SLDEM2015_512_30S_00S_315_360_CHUNKED_512.DAT", -30.0, 0.0, 315.0, 360.0),
    tile("proc/SLDEM2015_512_00N_30N_000_045_CHUNKED_512.DAT", 0.0, 30.0, 0.0, 45.0),
    tile("proc/SLDEM2015_512_00N_30N_045_090_CHUNKED_512.DAT", 0.0, 30.0, 45.0, 90.0),
    tile("proc/SLDEM2015_512_00N_30N_090_135_CHUNKED_512.DAT", 0.0, 30.0, 90.0, 135.0),
    tile("proc/SLDEM2015_512_00N_30N_135_180_CHUNKED_512.DAT", 0.0, 30.0, 135.0, 180.0),
    tile("proc/SLDEM2015_512_00N_30N_180_225_CHUNKED_512.DAT", 0.0, 30.0, 180.0, 225.0),
    tile("proc/SLDEM2015_512_00N_30N_225_270_CHUNKED_512.DAT", 0.0, 30.0, 225.0, 270.0),
    tile("proc/SLDEM2015_512_00N_30N_270_315_CHUNKED_512.DAT", 0.0, 30.0, 270.0, 315.0),
    tile("proc/SLDEM2015_512_00N_30N_315_360_CHUNKED_512.DAT", 0.0, 30.0, 315.0, 360.0),
    tile("proc/SLDEM2015_512_30N_60N_000_045_CHUNKED_512.DAT", 30.0, 60.0, 0.0, 45.0),
    tile("proc/SLDEM2015_512_30N_60N_045_090_CHUNKED_512.DAT", 30.0, 60.0, 45.0, 90.0),
    tile("proc/SLDEM2015_512_30N_60N_090_135_CHUNKED_512.DAT", 30.0, 60.0, 90.0, 135.0),
    tile("proc/SLDEM2015_512_30N_60N_135_180_CHUNKED_512.DAT", 30.0, 60.0, 135.0, 180.0),
    tile("proc/SLDEM2015_512_30N_60N_180_225_CHUNKED_512.DAT", 30.0, 60.0, 180.0, 225.0),
    tile("proc/SLDEM2015_512_30N_60N_225_270_CHUNKED_512.DAT", 30.0, 60.0, 225.0, 270.0),
    tile("proc/SLDEM2015_512_30N_60N_270_315_CHUNKED_512.DAT", 30.0, 60.0, 270.0, 315.0),
    tile("proc/SLDEM2015_512_30N_60N_315_360_CHUNKED_512.DAT", 30.0, 60.0, 315.0, 360.0),
];

/// Find the tile covering a geographic point, or `None` when the point lies
/// outside the dataset's latitude band. Longitude is wrapped before matching.
pub fn find_tile(lat_degrees: f64, lon_degrees: f64) -> Option<&'static TileMetadata> {
    if lat_degrees < MIN_LATITUDE || lat_degrees > MAX_LATITUDE {
        return None;
    }

    let wrapped_lon = wrap_longitude(lon_degrees);

    TILES.iter().find(|tile| {
        lat_degrees >= tile.min_latitude - LATITUDE_EPSILON
            && lat_degrees <= tile.max_latitude + LATITUDE_EPSILON
            && tile.contains_longitude(wrapped_lon)
    })
}

/// Construction-time invariant check: every registered tile must have
/// positive latitude and longitude spans. A violation is a data bug, not a
/// runtime condition.
pub fn validate_registry() -> TerrainResult<()> {
    for tile in TILES {
        if tile.latitude_span() <= 0.0 || tile.longitude_span() <= 0.0 {
            return Err(TerrainError::dataset(format!(
                "tile {} has a zero-width span",
                tile.filename
            )));
        }
    }
    Ok(())
}
