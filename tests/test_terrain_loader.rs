//! End-to-end tests for the terrain streaming engine against synthetic
//! chunked tile files.
//!
//! Tile files are written sparsely: only the chunks a test touches exist on
//! disk, filled with sentinel values (`file_base + chunk_index * 300000 +
//! inner_index`, exact in f32) so every read can be checked against the
//! expected chunk offset arithmetic.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use lunar_terrain::dataset::CHUNK_SIZE;
use lunar_terrain::{TerrainError, TerrainLoader};

const CHUNK_SAMPLES: i64 = CHUNK_SIZE * CHUNK_SIZE;
const CHUNK_BYTES: u64 = CHUNK_SAMPLES as u64 * 4;

const TILE_30N_60N_000_045: &str = "proc/SLDEM2015_512_30N_60N_000_045_CHUNKED_512.DAT";
const TILE_30N_60N_045_090: &str = "proc/SLDEM2015_512_30N_60N_045_090_CHUNKED_512.DAT";

fn sentinel_km(file_base: i64, chunk_index: i64, inner_index: i64) -> f32 {
    (file_base + chunk_index * 300_000 + inner_index) as f32
}

fn write_tile_chunks(root: &Path, filename: &str, file_base: i64, chunk_indices: &[i64]) {
    let path = root.join(filename);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut file = File::create(path).unwrap();
    for &chunk_index in chunk_indices {
        file.seek(SeekFrom::Start(chunk_index as u64 * CHUNK_BYTES))
            .unwrap();
        let mut raw = Vec::with_capacity(CHUNK_BYTES as usize);
        for inner in 0..CHUNK_SAMPLES {
            raw.extend_from_slice(&sentinel_km(file_base, chunk_index, inner).to_le_bytes());
        }
        file.write_all(&raw).unwrap();
    }
}

/// Expected meters for a pixel of chunk (0,0) in a file with base 0: the
/// sentinel is just the pixel's chunk-local index.
fn expected_meters(src_x: i64, src_y: i64) -> f32 {
    sentinel_km(0, 0, src_y * CHUNK_SIZE + src_x) * 1000.0
}

#[test]
fn full_load_samples_expected_pixels() {
    let root = tempfile::tempdir().unwrap();
    write_tile_chunks(root.path(), TILE_30N_60N_000_045, 0, &[0]);
    let mut loader = TerrainLoader::new(root.path()).unwrap();

    // 512 px/degree: POV (59.9, 0.5) centers on pixel (256, 51), so the
    // 8x8 step-1 window spans x 252..260, y 47..55, all inside chunk (0,0).
    let out = loader.load_or_update(59.9, 0.5, 8, 8, 1).unwrap();
    assert_eq!(out.len(), 64);
    for row in 0..8i64 {
        for x in 0..8i64 {
            assert_eq!(
                out[(row * 8 + x) as usize],
                expected_meters(252 + x, 47 + row),
                "sample ({}, {})",
                x,
                row
            );
        }
    }
}

#[test]
fn repeated_identical_load_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    write_tile_chunks(root.path(), TILE_30N_60N_000_045, 0, &[0]);
    let mut loader = TerrainLoader::new(root.path()).unwrap();

    let first = loader.load_or_update(59.9, 0.5, 8, 8, 1).unwrap();
    // Second call resolves to a zero grid shift and must not disturb the
    // buffer.
    let second = loader.load_or_update(59.9, 0.5, 8, 8, 1).unwrap();
    assert_eq!(first, second);
}

#[test]
fn scroll_sequence_matches_direct_full_load() {
    let root = tempfile::tempdir().unwrap();
    write_tile_chunks(root.path(), TILE_30N_60N_000_045, 0, &[0]);

    let mut scrolled = TerrainLoader::new(root.path()).unwrap();
    scrolled.load_or_update(59.9, 0.5, 8, 8, 1).unwrap();

    let povs = [
        (59.898, 0.52),
        (59.895, 0.55),
        (59.893, 0.57),
        (59.89, 0.6),
    ];
    let mut last = Vec::new();
    for (lat, lon) in povs {
        last = scrolled.load_or_update(lat, lon, 8, 8, 1).unwrap();
    }

    let (final_lat, final_lon) = *povs.last().unwrap();
    let mut direct = TerrainLoader::new(root.path()).unwrap();
    let reference = direct.load_or_update(final_lat, final_lon, 8, 8, 1).unwrap();

    assert_eq!(last, reference);
}

#[test]
fn scroll_many_small_moves_matches_direct_full_load() {
    // Long sequence of sub-pixel-ish moves: the discrete grid shift must not
    // accumulate drift relative to a one-shot load at the final POV.
    let root = tempfile::tempdir().unwrap();
    write_tile_chunks(root.path(), TILE_30N_60N_000_045, 0, &[0]);

    let mut scrolled = TerrainLoader::new(root.path()).unwrap();
    let mut lat = 59.9;
    let mut lon = 0.5;
    scrolled.load_or_update(lat, lon, 8, 8, 1).unwrap();

    let mut last = Vec::new();
    for _ in 0..40 {
        lat -= 0.0011;
        lon += 0.0023;
        last = scrolled.load_or_update(lat, lon, 8, 8, 1).unwrap();
    }

    let mut direct = TerrainLoader::new(root.path()).unwrap();
    let reference = direct.load_or_update(lat, lon, 8, 8, 1).unwrap();
    assert_eq!(last, reference);
}

#[test]
fn window_crossing_tile_edge_falls_back_to_neighbor() {
    let root = tempfile::tempdir().unwrap();
    // Main tile: the eastmost chunk column of the top row. Neighbor tile:
    // its westmost chunk, with a distinct sentinel base.
    write_tile_chunks(root.path(), TILE_30N_60N_000_045, 0, &[44]);
    write_tile_chunks(root.path(), TILE_30N_60N_045_090, 7_000_000, &[0]);
    let mut loader = TerrainLoader::new(root.path()).unwrap();

    // POV (59.9, 44.999) centers on pixel x = 23039: the window's last
    // three columns run past the tile's 23040-pixel raster.
    let out = loader.load_or_update(59.9, 44.999, 8, 8, 1).unwrap();
    assert_eq!(loader.open_streams(), 2);

    for row in 0..8i64 {
        let src_y = 47 + row;
        for x in 0..8i64 {
            let src_x = 23035 + x;
            let expected = if src_x < 23040 {
                // Chunk (44, 0) of the main tile.
                let inner = (src_y % CHUNK_SIZE) * CHUNK_SIZE + (src_x - 44 * CHUNK_SIZE);
                sentinel_km(0, 44, inner) * 1000.0
            } else if src_x == 23040 {
                // Exactly on the edge: longitude 45.0 still matches the main
                // tile and clamps to its last raster column.
                let inner = (src_y % CHUNK_SIZE) * CHUNK_SIZE + (23039 - 44 * CHUNK_SIZE);
                sentinel_km(0, 44, inner) * 1000.0
            } else {
                // Past the edge: resolved through the neighbor tile.
                let neighbor_x = src_x - 23040;
                let inner = src_y * CHUNK_SIZE + neighbor_x;
                sentinel_km(7_000_000, 0, inner) * 1000.0
            };
            assert_eq!(
                out[(row * 8 + x) as usize],
                expected,
                "sample ({}, {})",
                x,
                row
            );
        }
    }
}

#[test]
fn pov_at_band_edge_zero_fills_uncovered_samples() {
    let root = tempfile::tempdir().unwrap();
    write_tile_chunks(root.path(), TILE_30N_60N_000_045, 0, &[0]);
    let mut loader = TerrainLoader::new(root.path()).unwrap();

    // POV exactly at the tile's north-west corner: half of the window has
    // no coverage (latitude above 60, or a longitude tile with no file).
    let out = loader.load_or_update(60.0, 0.0, 4, 4, 1).unwrap();
    assert_eq!(out.len(), 16);

    // start = (-2, -2): cells with src >= 0 on both axes come from the tile.
    for row in 0..4i64 {
        for x in 0..4i64 {
            let (src_x, src_y) = (x - 2, row - 2);
            let expected = if src_x >= 0 && src_y >= 0 {
                expected_meters(src_x, src_y)
            } else {
                0.0
            };
            assert_eq!(out[(row * 4 + x) as usize], expected);
        }
    }
}

#[test]
fn dataset_miss_returns_previous_buffer() {
    let root = tempfile::tempdir().unwrap();
    write_tile_chunks(root.path(), TILE_30N_60N_000_045, 0, &[0]);
    let mut loader = TerrainLoader::new(root.path()).unwrap();

    let loaded = loader.load_or_update(59.9, 0.5, 8, 8, 1).unwrap();
    let after_miss = loader.load_or_update(80.0, 0.5, 8, 8, 1).unwrap();
    assert_eq!(loaded, after_miss);
}

#[test]
fn dimension_change_triggers_full_reload() {
    let root = tempfile::tempdir().unwrap();
    write_tile_chunks(root.path(), TILE_30N_60N_000_045, 0, &[0]);
    let mut loader = TerrainLoader::new(root.path()).unwrap();

    loader.load_or_update(59.9, 0.5, 8, 8, 1).unwrap();
    let out = loader.load_or_update(59.9, 0.5, 4, 4, 2).unwrap();
    assert_eq!(out.len(), 16);

    // steps=2 halves the footprint per axis: start = center - 4.
    for row in 0..4i64 {
        for x in 0..4i64 {
            assert_eq!(
                out[(row * 4 + x) as usize],
                expected_meters(252 + x * 2, 47 + row * 2)
            );
        }
    }
}

#[test]
fn missing_tile_file_degrades_to_zero_fill() {
    let root = tempfile::tempdir().unwrap();
    let mut loader = TerrainLoader::new(root.path()).unwrap();

    // Covered POV, but no file on disk: nothing was ever loaded, so the
    // result stays empty rather than erroring.
    let out = loader.load_or_update(59.9, 0.5, 8, 8, 1).unwrap();
    assert!(out.is_empty());
}

#[test]
fn invalid_arguments_fail_before_io() {
    let mut loader = TerrainLoader::new("/nonexistent").unwrap();
    assert!(matches!(
        loader.load_or_update(59.9, 0.5, 0, 8, 1),
        Err(TerrainError::InvalidArgument(_))
    ));
    assert!(matches!(
        loader.load_or_update(59.9, 0.5, 8, 0, 1),
        Err(TerrainError::InvalidArgument(_))
    ));
    assert!(matches!(
        loader.load_or_update(59.9, 0.5, 8, 8, 0),
        Err(TerrainError::InvalidArgument(_))
    ));
}
