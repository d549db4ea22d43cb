//! LRU cache of fully-sampled 1x1 degree terrain tiles.
//!
//! The sphere renderer asks for the same square patches over and over with
//! floating-point jitter on the POV, so requests are keyed by lat/lon rounded
//! to the nearest degree plus the resolution. Entries are immutable once
//! inserted; the cache holds a hard capacity and evicts the least recently
//! used entry first.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use crate::dataset::{self, find_tile, TileMetadata};
use crate::error::TerrainResult;
use crate::stream::TileStream;

/// Default number of cached tiles.
pub const DEFAULT_CAPACITY: usize = 128;

/// A requested square patch: `resolution` samples per edge spanning exactly
/// one degree in each axis starting at `(lat_start_deg, lon_start_deg)`.
#[derive(Debug, Clone, Copy)]
pub struct TileRequest {
    pub lat_start_deg: f64,
    pub lon_start_deg: f64,
    pub resolution: usize,
}

/// A sampled patch in meters, with its elevation range.
#[derive(Debug, Clone)]
pub struct TileSample {
    pub heights: Vec<f32>,
    pub min_elevation: f32,
    pub max_elevation: f32,
    pub resolution: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TileKey {
    lat_deg_start: i32,
    lon_deg_wrapped: i32,
    resolution: usize,
}

fn make_key(request: &TileRequest) -> TileKey {
    let mut wrapped = (request.lon_start_deg.round() as i32) % 360;
    if wrapped < 0 {
        wrapped += 360;
    }
    TileKey {
        lat_deg_start: request.lat_start_deg.round() as i32,
        lon_deg_wrapped: wrapped,
        resolution: request.resolution,
    }
}

/// Bounded memoization of sampled tiles, LRU eviction.
pub struct TerrainTileCache {
    data_root: PathBuf,
    capacity: usize,
    entries: HashMap<TileKey, TileSample>,
    access_order: VecDeque<TileKey>,
    streams: HashMap<&'static str, TileStream>,
}

impl TerrainTileCache {
    /// Create a cache rooted at `data_root` holding at most `capacity`
    /// sampled tiles (clamped to at least one).
    pub fn new(data_root: impl Into<PathBuf>, capacity: usize) -> TerrainResult<Self> {
        dataset::validate_registry()?;
        Ok(Self {
            data_root: data_root.into(),
            capacity: capacity.max(1),
            entries: HashMap::new(),
            access_order: VecDeque::new(),
            streams: HashMap::new(),
        })
    }

    pub fn with_default_capacity(data_root: impl Into<PathBuf>) -> TerrainResult<Self> {
        Self::new(data_root, DEFAULT_CAPACITY)
    }

    /// Fetch the sampled tile for a request, synthesizing and caching it on
    /// miss. Access promotes the entry to most recently used. Returns `None`
    /// for degenerate resolutions and for requests outside the dataset.
    pub fn fetch(&mut self, request: &TileRequest) -> Option<&TileSample> {
        if request.resolution <= 1 {
            return None;
        }

        let key = make_key(request);
        if self.entries.contains_key(&key) {
            self.touch(key);
            return self.entries.get(&key);
        }

        let sample = self.load_tile(request)?;

        while self.entries.len() >= self.capacity {
            if let Some(oldest) = self.access_order.pop_front() {
                self.entries.remove(&oldest);
            } else {
                break;
            }
        }

        self.entries.insert(key, sample);
        self.access_order.push_back(key);
        self.entries.get(&key)
    }

    /// Whether a request is cached, without touching the access order.
    pub fn contains(&self, request: &TileRequest) -> bool {
        self.entries.contains_key(&make_key(request))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.access_order.clear();
    }

    fn touch(&mut self, key: TileKey) {
        self.access_order.retain(|k| *k != key);
        self.access_order.push_back(key);
    }

    /// Synthesize a `resolution x resolution` sample grid spanning exactly
    /// one degree per axis. `None` when no tile covers the cell's center.
    fn load_tile(&mut self, request: &TileRequest) -> Option<TileSample> {
        // Coverage gate at the cell center; per-sample lookups re-resolve.
        find_tile(request.lat_start_deg + 0.5, request.lon_start_deg + 0.5)?;

        let resolution = request.resolution;
        let mut heights = vec![0.0f32; resolution * resolution];
        let mut min_elevation = f32::MAX;
        let mut max_elevation = f32::MIN;

        let step = 1.0 / (resolution - 1) as f64;

        for r in 0..resolution {
            let lat = request.lat_start_deg + r as f64 * step;
            for c in 0..resolution {
                let lon = request.lon_start_deg + c as f64 * step;
                let height_meters = self.sample_height(lat, lon);
                heights[r * resolution + c] = height_meters;
                min_elevation = min_elevation.min(height_meters);
                max_elevation = max_elevation.max(height_meters);
            }
        }

        if min_elevation == f32::MAX {
            min_elevation = 0.0;
            max_elevation = 0.0;
        }

        self.clear_all_chunks();

        Some(TileSample {
            heights,
            min_elevation,
            max_elevation,
            resolution,
        })
    }

    /// Single-point elevation in meters; 0.0 for any miss.
    fn sample_height(&mut self, lat: f64, lon: f64) -> f32 {
        let Some(tile) = find_tile(lat, lon) else {
            return 0.0;
        };
        match self.ensure_stream(tile) {
            Some(stream) => stream.height_at_geo(tile, lat, lon) * 1000.0,
            None => 0.0,
        }
    }

    fn ensure_stream(&mut self, tile: &'static TileMetadata) -> Option<&mut TileStream> {
        if !self.streams.contains_key(tile.filename) {
            match TileStream::open(&self.data_root, tile) {
                Ok(stream) => {
                    self.streams.insert(tile.filename, stream);
                }
                Err(err) => {
                    log::debug!("could not open tile {}: {}", tile.filename, err);
                    return None;
                }
            }
        }
        self.streams.get_mut(tile.filename)
    }

    fn clear_all_chunks(&mut self) {
        for stream in self.streams.values_mut() {
            stream.clear_chunks();
        }
    }
}
