//! Lazily-loaded color map with bilinear sampling.
//!
//! The map is one large equirectangular image covering latitudes [-55, 55]
//! and the full longitude range. It is decoded on first use behind a mutex so
//! concurrent samplers cannot race the load; samplers then work from an `Arc`
//! snapshot taken under the lock, which is released before any pixel math.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::imageops::FilterType;

/// Color map location under the data root.
pub const COLOR_MAP_RELATIVE_PATH: &str = "color/colormap-1kmpp.tif";

/// Returned when the map is missing or unreadable.
pub const FALLBACK_COLOR: [f32; 3] = [1.0, 1.0, 1.0];
/// Returned for latitudes outside the map's coverage band.
pub const OUT_OF_RANGE_COLOR: [f32; 3] = [0.7, 0.7, 0.7];

/// Decoded images larger than this are downscaled, preserving aspect ratio.
const MAX_DIMENSION: u32 = 4096;

const COVERAGE_LAT_NORTH: f32 = 55.0;
const COVERAGE_LAT_SOUTH: f32 = -55.0;

struct ColorMapImage {
    width: u32,
    height: u32,
    /// Tightly packed RGB8, row-major.
    pixels: Vec<u8>,
}

enum ColorMapState {
    Unloaded,
    Failed,
    Loaded(Arc<ColorMapImage>),
}

/// Bilinear-filtered lookup into the pre-decoded color map.
pub struct ColorMapSampler {
    path: PathBuf,
    state: Mutex<ColorMapState>,
}

impl ColorMapSampler {
    /// Sampler for the standard color map under `data_root`.
    pub fn new(data_root: impl AsRef<Path>) -> Self {
        Self::from_path(data_root.as_ref().join(COLOR_MAP_RELATIVE_PATH))
    }

    /// Sampler for an explicit image path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(ColorMapState::Unloaded),
        }
    }

    /// Whether the map has been loaded successfully.
    pub fn has_data(&self) -> bool {
        matches!(self.state.lock().as_deref(), Ok(ColorMapState::Loaded(_)))
    }

    /// Sample the map at normalized coordinates, bilinear-filtered.
    /// `u` and `v` are clamped into [0, 1]. Fallback white when the map
    /// cannot be loaded.
    pub fn sample(&self, u: f32, v: f32) -> [f32; 3] {
        match self.snapshot() {
            Some(map) => sample_bilinear(&map, u.clamp(0.0, 1.0), v.clamp(0.0, 1.0)),
            None => FALLBACK_COLOR,
        }
    }

    /// Sample a `width x height` color grid for a viewport centered on the
    /// POV and spanning `total_lat_span x total_lon_span` degrees, indexed
    /// identically to the elevation buffer. Rows run north to south.
    pub fn sample_colors_for_terrain(
        &self,
        pov_lat_degrees: f64,
        pov_lon_degrees: f64,
        width: usize,
        height: usize,
        total_lat_span: f32,
        total_lon_span: f32,
    ) -> Vec<[f32; 3]> {
        if width == 0 || height == 0 {
            return Vec::new();
        }

        let Some(map) = self.snapshot() else {
            return vec![FALLBACK_COLOR; width * height];
        };

        let lat_top = pov_lat_degrees as f32 + total_lat_span / 2.0;
        let lon_left = pov_lon_degrees as f32 - total_lon_span / 2.0;
        let deg_per_pixel_y = total_lat_span / height as f32;
        let deg_per_pixel_x = total_lon_span / width as f32;

        let mut colors = Vec::with_capacity(width * height);
        for y in 0..height {
            let lat = lat_top - y as f32 * deg_per_pixel_y;
            for x in 0..width {
                let lon = lon_left + x as f32 * deg_per_pixel_x;

                let mut u = (lon + 180.0) / 360.0;
                if u >= 1.0 {
                    u -= 1.0;
                }
                if u < 0.0 {
                    u += 1.0;
                }
                let v = (COVERAGE_LAT_NORTH - lat) / (COVERAGE_LAT_NORTH - COVERAGE_LAT_SOUTH);

                let color = if !(0.0..1.0).contains(&v) {
                    OUT_OF_RANGE_COLOR
                } else {
                    sample_bilinear(&map, u.clamp(0.0, 1.0), v)
                };
                colors.push(color);
            }
        }
        colors
    }

    /// Double-checked lazy load: the lock covers the idempotent load check
    /// and is released before sampling. A failed load is remembered and not
    /// retried per call.
    fn snapshot(&self) -> Option<Arc<ColorMapImage>> {
        let mut state = self.state.lock().ok()?;
        match &*state {
            ColorMapState::Loaded(map) => Some(Arc::clone(map)),
            ColorMapState::Failed => None,
            ColorMapState::Unloaded => match load_color_map(&self.path) {
                Some(map) => {
                    let map = Arc::new(map);
                    *state = ColorMapState::Loaded(Arc::clone(&map));
                    Some(map)
                }
                None => {
                    *state = ColorMapState::Failed;
                    None
                }
            },
        }
    }
}

fn load_color_map(path: &Path) -> Option<ColorMapImage> {
    let decoded = match image::open(path) {
        Ok(decoded) => decoded,
        Err(err) => {
            log::error!("failed to load color map {}: {}", path.display(), err);
            return None;
        }
    };

    let (src_width, src_height) = (decoded.width(), decoded.height());
    let decoded = if src_width > MAX_DIMENSION || src_height > MAX_DIMENSION {
        decoded.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Triangle)
    } else {
        decoded
    };

    let rgb = decoded.to_rgb8();
    let (width, height) = (rgb.width(), rgb.height());
    if width == 0 || height == 0 {
        log::error!("color map {} has no image data", path.display());
        return None;
    }

    log::info!("loaded color map ({} x {})", width, height);
    Some(ColorMapImage {
        width,
        height,
        pixels: rgb.into_raw(),
    })
}

fn sample_bilinear(map: &ColorMapImage, u: f32, v: f32) -> [f32; 3] {
    let x = u * (map.width - 1) as f32;
    let y = v * (map.height - 1) as f32;

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(map.width - 1);
    let y1 = (y0 + 1).min(map.height - 1);

    let tx = x - x0 as f32;
    let ty = y - y0 as f32;

    let fetch = |px: u32, py: u32| -> [f32; 3] {
        let index = (py as usize * map.width as usize + px as usize) * 3;
        [
            map.pixels[index] as f32 / 255.0,
            map.pixels[index + 1] as f32 / 255.0,
            map.pixels[index + 2] as f32 / 255.0,
        ]
    };

    let c00 = fetch(x0, y0);
    let c10 = fetch(x1, y0);
    let c01 = fetch(x0, y1);
    let c11 = fetch(x1, y1);

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;

    let mut result = [0.0f32; 3];
    for channel in 0..3 {
        let top = lerp(c00[channel], c10[channel], tx);
        let bottom = lerp(c01[channel], c11[channel], tx);
        result[channel] = lerp(top, bottom, ty);
    }
    result
}
