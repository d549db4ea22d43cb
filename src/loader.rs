//! Stateful terrain streaming engine.
//!
//! `TerrainLoader` maps a geographic point of view onto the chunked tile
//! files and keeps a resident elevation buffer for the current viewport.
//! Each request either rebuilds the buffer sample-by-sample (full load) or
//! shifts it by a discrete grid delta and fills only the exposed border
//! (scroll update). Samples that fall outside the resolved tile's raster go
//! through a slower global lookup that re-resolves the covering tile, so a
//! viewport may straddle tile boundaries.
//!
//! Internally everything is stored in kilometers; the public API converts to
//! meters on the way out.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::dataset::{
    self, find_tile, wrap_longitude, TileMetadata, TILE_HEIGHT, TILE_WIDTH,
};
use crate::error::{TerrainError, TerrainResult};
use crate::stream::TileStream;

/// The remembered footprint of the resident elevation buffer. Replaced as a
/// whole whenever the buffer changes, so the fields can never drift apart.
#[derive(Debug, Clone, Copy)]
struct Viewport {
    tile: &'static str,
    pov_lat: f64,
    pov_lon: f64,
    width: usize,
    height: usize,
    steps: i64,
    center_x: i64,
    center_y: i64,
}

/// Pixel-space view of one (tile, POV, dimensions) combination.
struct ViewParams {
    center_x: i64,
    center_y: i64,
    start_x: i64,
    start_y: i64,
    deg_per_pixel_x: f64,
    deg_per_pixel_y: f64,
}

fn view_params(
    tile: &TileMetadata,
    pov_lat: f64,
    pov_lon: f64,
    width: usize,
    height: usize,
    steps: i64,
) -> ViewParams {
    let pixels_per_degree_x = TILE_WIDTH as f64 / tile.longitude_span();
    let pixels_per_degree_y = TILE_HEIGHT as f64 / tile.latitude_span();

    let lon_offset = tile.longitude_offset(pov_lon);
    let clamped_lat = pov_lat.clamp(tile.min_latitude, tile.max_latitude);

    let center_x =
        ((lon_offset * pixels_per_degree_x).round() as i64).clamp(0, TILE_WIDTH - 1);
    let center_y = (((tile.max_latitude - clamped_lat) * pixels_per_degree_y).round() as i64)
        .clamp(0, TILE_HEIGHT - 1);

    // The viewport is centered on the POV.
    let sample_width = width as i64 * steps;
    let sample_height = height as i64 * steps;

    ViewParams {
        center_x,
        center_y,
        start_x: center_x - sample_width / 2,
        start_y: center_y - sample_height / 2,
        deg_per_pixel_x: 1.0 / pixels_per_degree_x,
        deg_per_pixel_y: 1.0 / pixels_per_degree_y,
    }
}

fn in_tile_raster(x: i64, y: i64) -> bool {
    x >= 0 && x < TILE_WIDTH && y >= 0 && y < TILE_HEIGHT
}

/// Disk-backed elevation source with incremental viewport updates.
pub struct TerrainLoader {
    data_root: PathBuf,
    streams: HashMap<&'static str, TileStream>,
    /// Resident buffer in kilometers, row-major `width * height`.
    elevation_km: Vec<f32>,
    current: Option<Viewport>,
    warned_no_coverage: bool,
    warned_missing_tile: bool,
}

impl TerrainLoader {
    /// Create a loader rooted at `data_root`. Fails if the static tile
    /// registry violates its span invariants.
    pub fn new(data_root: impl Into<PathBuf>) -> TerrainResult<Self> {
        dataset::validate_registry()?;
        Ok(Self {
            data_root: data_root.into(),
            streams: HashMap::new(),
            elevation_km: Vec::new(),
            current: None,
            warned_no_coverage: false,
            warned_missing_tile: false,
        })
    }

    /// Load or incrementally update the elevation buffer for the given point
    /// of view and sampling parameters. Returns the buffer in meters,
    /// row-major with `row * width + x` indexing.
    ///
    /// A POV outside the dataset is an expected edge: the previous buffer is
    /// returned unchanged (empty if nothing was ever loaded). Non-positive
    /// dimensions or steps are rejected before any I/O.
    pub fn load_or_update(
        &mut self,
        pov_lat: f64,
        pov_lon: f64,
        width: usize,
        height: usize,
        steps: i64,
    ) -> TerrainResult<Vec<f32>> {
        if width == 0 || height == 0 {
            return Err(TerrainError::invalid_argument(format!(
                "output dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        if steps < 1 {
            return Err(TerrainError::invalid_argument(format!(
                "sampling step must be >= 1, got {}",
                steps
            )));
        }

        let Some(tile) = find_tile(pov_lat, pov_lon) else {
            if !self.warned_no_coverage {
                log::warn!(
                    "no terrain tile covers lat={} lon={}; keeping previous data",
                    pov_lat,
                    pov_lon
                );
                self.warned_no_coverage = true;
            }
            return Ok(self.elevation_meters());
        };

        let current = self.current;
        match current {
            Some(v)
                if v.width == width
                    && v.height == height
                    && v.steps == steps
                    && v.tile == tile.filename =>
            {
                self.scroll_load(pov_lat, pov_lon, tile, v)
            }
            _ => self.full_load(pov_lat, pov_lon, width, height, steps, tile),
        }

        Ok(self.elevation_meters())
    }

    /// Number of distinct tile streams opened so far.
    pub fn open_streams(&self) -> usize {
        self.streams.len()
    }

    fn elevation_meters(&self) -> Vec<f32> {
        self.elevation_km.iter().map(|v| v * 1000.0).collect()
    }

    /// Rebuild the whole buffer sample-by-sample.
    fn full_load(
        &mut self,
        pov_lat: f64,
        pov_lon: f64,
        width: usize,
        height: usize,
        steps: i64,
        tile: &'static TileMetadata,
    ) {
        log::info!("performing full terrain load at lat={} lon={}", pov_lat, pov_lon);

        let view = view_params(tile, pov_lat, pov_lon, width, height, steps);

        if self.ensure_stream(tile).is_none() {
            if self.current.is_none() {
                self.elevation_km.clear();
            }
            return;
        }

        let mut data = vec![0.0f32; width * height];
        // Samples outside the main tile's raster, filled by global lookup.
        let mut fallback: Vec<(usize, i64, i64)> = Vec::new();

        if let Some(stream) = self.streams.get_mut(tile.filename) {
            for row in 0..height {
                let src_y = view.start_y + row as i64 * steps;
                for x in 0..width {
                    let src_x = view.start_x + x as i64 * steps;
                    let index = row * width + x;
                    if in_tile_raster(src_x, src_y) {
                        data[index] = stream.height_at(src_x, src_y);
                    } else {
                        fallback.push((index, src_x, src_y));
                    }
                }
            }
        }

        for (index, src_x, src_y) in fallback {
            let sample_lat = tile.max_latitude - src_y as f64 * view.deg_per_pixel_y;
            let sample_lon = tile.min_longitude + src_x as f64 * view.deg_per_pixel_x;
            data[index] = self.lookup_height(sample_lat, sample_lon);
        }

        self.elevation_km = data;
        self.current = Some(Viewport {
            tile: tile.filename,
            pov_lat,
            pov_lon,
            width,
            height,
            steps,
            center_x: view.center_x,
            center_y: view.center_y,
        });
        self.clear_all_chunks();
    }

    /// Shift the resident buffer by a discrete grid delta and load only the
    /// newly exposed border.
    fn scroll_load(&mut self, pov_lat: f64, pov_lon: f64, tile: &'static TileMetadata, v: Viewport) {
        let view = view_params(tile, pov_lat, pov_lon, v.width, v.height, v.steps);

        // Rounding, not truncation: truncation would drift the viewport off
        // the POV over repeated small moves.
        let shift_x = ((view.center_x - v.center_x) as f64 / v.steps as f64).round() as i64;
        let shift_y = ((view.center_y - v.center_y) as f64 / v.steps as f64).round() as i64;

        if shift_x == 0 && shift_y == 0 {
            return;
        }

        if shift_x.abs() >= v.width as i64 || shift_y.abs() >= v.height as i64 {
            // No overlap survives the shift.
            self.full_load(pov_lat, pov_lon, v.width, v.height, v.steps, tile);
            return;
        }

        log::debug!("scrolling grid by ({}, {})", shift_x, shift_y);

        let (width, height, steps) = (v.width, v.height, v.steps);
        let mut data = vec![0.0f32; width * height];
        let mut needs_loading = vec![false; width * height];

        for y in 0..height {
            for x in 0..width {
                let old_x = x as i64 + shift_x;
                let old_y = y as i64 + shift_y;
                let index = y * width + x;
                if old_x >= 0 && (old_x as usize) < width && old_y >= 0 && (old_y as usize) < height
                {
                    data[index] = self.elevation_km[old_y as usize * width + old_x as usize];
                } else {
                    needs_loading[index] = true;
                }
            }
        }

        // Advance the center by whole grid steps so the sample grid stays
        // aligned to integer step multiples of the previous one.
        let center_x = v.center_x + shift_x * steps;
        let center_y = v.center_y + shift_y * steps;
        let start_x = center_x - (width as i64 * steps) / 2;
        let start_y = center_y - (height as i64 * steps) / 2;

        let mut fallback: Vec<(usize, i64, i64)> = Vec::new();

        match self.ensure_stream(tile) {
            Some(stream) => {
                for y in 0..height {
                    let src_y = start_y + y as i64 * steps;
                    for x in 0..width {
                        let index = y * width + x;
                        if !needs_loading[index] {
                            continue;
                        }
                        let src_x = start_x + x as i64 * steps;
                        if in_tile_raster(src_x, src_y) {
                            data[index] = stream.height_at(src_x, src_y);
                        } else {
                            fallback.push((index, src_x, src_y));
                        }
                    }
                }
            }
            // Keep the old buffer when the tile cannot be opened.
            None => return,
        }

        for (index, src_x, src_y) in fallback {
            let sample_lat = tile.max_latitude - src_y as f64 * view.deg_per_pixel_y;
            let sample_lon = tile.min_longitude + src_x as f64 * view.deg_per_pixel_x;
            data[index] = self.lookup_height(sample_lat, sample_lon);
        }

        self.elevation_km = data;
        self.current = Some(Viewport {
            pov_lat,
            pov_lon,
            center_x,
            center_y,
            ..v
        });
        self.clear_all_chunks();
    }

    /// Global point lookup in kilometers. Re-resolves the covering tile, so
    /// it works for samples that fall outside the main tile's raster.
    /// Any miss along the way degrades to 0.0.
    fn lookup_height(&mut self, lat: f64, lon: f64) -> f32 {
        if lat < dataset::MIN_LATITUDE || lat > dataset::MAX_LATITUDE {
            return 0.0;
        }

        let Some(tile) = find_tile(lat, lon) else {
            if !self.warned_missing_tile {
                log::warn!("no DEM tile for lat={} lon={}", lat, wrap_longitude(lon));
                self.warned_missing_tile = true;
            }
            return 0.0;
        };

        match self.ensure_stream(tile) {
            Some(stream) => stream.height_at_geo(tile, lat, lon),
            None => 0.0,
        }
    }

    /// Look up or open the stream for a tile. Open failures are recoverable
    /// per-tile: they log and yield `None`, and the caller zero-fills.
    fn ensure_stream(&mut self, tile: &'static TileMetadata) -> Option<&mut TileStream> {
        if !self.streams.contains_key(tile.filename) {
            match TileStream::open(&self.data_root, tile) {
                Ok(stream) => {
                    self.streams.insert(tile.filename, stream);
                }
                Err(err) => {
                    log::error!("could not open tile {}: {}", tile.filename, err);
                    return None;
                }
            }
        }
        self.streams.get_mut(tile.filename)
    }

    /// Chunk caches are cleared after every update cycle so residency is
    /// bounded by the chunks touched per frame, not per session.
    fn clear_all_chunks(&mut self) {
        for stream in self.streams.values_mut() {
            stream.clear_chunks();
        }
    }
}
