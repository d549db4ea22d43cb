//! Per-tile file stream with an in-memory chunk cache.
//!
//! A `TileStream` owns exactly one OS file handle and one chunk cache. Chunks
//! are fetched with a single seek + read on first access and served from
//! memory afterwards; the cache only ever grows until the owner clears it
//! wholesale after an update cycle, bounding memory to the chunks touched
//! since the last clear.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::dataset::{TileMetadata, CHUNK_SIZE, NUM_CHUNKS_X, NUM_CHUNKS_Y, TILE_HEIGHT, TILE_WIDTH};

const CHUNK_SAMPLES: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;
const CHUNK_BYTES: u64 = (CHUNK_SAMPLES * std::mem::size_of::<f32>()) as u64;

/// Open handle onto one tile file plus the densities needed to map degrees to
/// raster pixels. Density fields are computed once at open and never change.
pub struct TileStream {
    file: File,
    pub pixels_per_degree_x: f64,
    pub pixels_per_degree_y: f64,
    chunks: HashMap<u64, Vec<f32>>,
}

fn chunk_key(chunk_x: i64, chunk_y: i64) -> u64 {
    ((chunk_y as u64) << 32) | (chunk_x as u64)
}

impl TileStream {
    /// Open the tile file under `data_root`. Assumes the registry has been
    /// validated, so the metadata spans are positive.
    pub fn open(data_root: &Path, tile: &TileMetadata) -> std::io::Result<Self> {
        let path = data_root.join(tile.filename);
        let file = File::open(&path)?;

        Ok(Self {
            file,
            pixels_per_degree_x: TILE_WIDTH as f64 / tile.longitude_span(),
            pixels_per_degree_y: TILE_HEIGHT as f64 / tile.latitude_span(),
            chunks: HashMap::new(),
        })
    }

    /// Fetch one decoded chunk, reading it from disk on first access.
    /// Out-of-range coordinates and failed reads yield `None`; a failed read
    /// leaves the stream usable for later fetches.
    pub fn fetch_chunk(&mut self, chunk_x: i64, chunk_y: i64) -> Option<&[f32]> {
        if chunk_x < 0 || chunk_x >= NUM_CHUNKS_X || chunk_y < 0 || chunk_y >= NUM_CHUNKS_Y {
            return None;
        }

        let key = chunk_key(chunk_x, chunk_y);
        if self.chunks.contains_key(&key) {
            return self.chunks.get(&key).map(Vec::as_slice);
        }

        let linear_index = chunk_y * NUM_CHUNKS_X + chunk_x;
        let byte_offset = linear_index as u64 * CHUNK_BYTES;

        let chunk = match read_chunk_at(&mut self.file, byte_offset) {
            Ok(chunk) => chunk,
            Err(err) => {
                log::warn!("chunk read failed at offset {}: {}", byte_offset, err);
                return None;
            }
        };

        Some(self.chunks.entry(key).or_insert(chunk).as_slice())
    }

    /// Height in kilometers at a raster pixel, via the chunk cache.
    /// Returns 0.0 when the chunk cannot be fetched.
    pub fn height_at(&mut self, pixel_x: i64, pixel_y: i64) -> f32 {
        let chunk_x = pixel_x / CHUNK_SIZE;
        let chunk_y = pixel_y / CHUNK_SIZE;

        let Some(chunk) = self.fetch_chunk(chunk_x, chunk_y) else {
            return 0.0;
        };

        let inner_x = pixel_x % CHUNK_SIZE;
        let inner_y = pixel_y % CHUNK_SIZE;
        let inner_index = (inner_y * CHUNK_SIZE + inner_x) as usize;
        chunk.get(inner_index).copied().unwrap_or(0.0)
    }

    /// Height in kilometers at a geographic point, assuming `tile` is the
    /// tile this stream was opened for. Latitude is clamped into the tile's
    /// band and both axes are clamped to the raster edge.
    pub fn height_at_geo(&mut self, tile: &TileMetadata, lat: f64, lon: f64) -> f32 {
        let lon_offset = tile.longitude_offset(lon);
        let clamped_lat = lat.clamp(tile.min_latitude, tile.max_latitude);

        let pixel_x =
            ((lon_offset * self.pixels_per_degree_x).round() as i64).clamp(0, TILE_WIDTH - 1);
        let pixel_y = (((tile.max_latitude - clamped_lat) * self.pixels_per_degree_y).round()
            as i64)
            .clamp(0, TILE_HEIGHT - 1);

        self.height_at(pixel_x, pixel_y)
    }

    /// Drop every cached chunk. Eviction is all-or-nothing.
    pub fn clear_chunks(&mut self) {
        self.chunks.clear();
        self.chunks.shrink_to_fit();
    }

    /// Number of chunks currently resident.
    pub fn cached_chunks(&self) -> usize {
        self.chunks.len()
    }
}

fn read_chunk_at(file: &mut File, byte_offset: u64) -> std::io::Result<Vec<f32>> {
    let mut raw = vec![0u8; CHUNK_BYTES as usize];
    file.seek(SeekFrom::Start(byte_offset))?;
    file.read_exact(&mut raw)?;

    let mut samples = Vec::with_capacity(CHUNK_SAMPLES);
    for bytes in raw.chunks_exact(4) {
        samples.push(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]));
    }
    Ok(samples)
}
