//! Tile grid planning.
//!
//! Given a geographic bounding box, a zoom level, and a tile footprint, the
//! planner lays out a regular grid of tile centers in Web Mercator pixel
//! space and produces one [`TileRequest`] per grid cell, plus the
//! [`GridMetadata`] that describes the whole job.
//!
//! The grid is centered on the bounding-box midpoint and sized so that it
//! covers the box; it may extend slightly past the requested bounds. That
//! overhang is intentional and relied upon by downstream consumers.

use serde::Serialize;

use crate::coord::{self, PixelCoord};

/// A single tile to fetch: the geographic center of one grid cell plus its
/// position in the grid.
///
/// Requests are produced once by [`plan`] and never mutated. `index` is the
/// row-major position (`row * num_cols + col`) and is the sole ordering key
/// for results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileRequest {
    /// Latitude of the tile center in degrees.
    pub lat: f64,
    /// Longitude of the tile center in degrees.
    pub lon: f64,
    /// Grid row (0 at the north edge, increasing southward).
    pub row: u32,
    /// Grid column (0 at the west edge, increasing eastward).
    pub col: u32,
    /// Row-major index: `row * num_cols + col`.
    pub index: usize,
}

/// Geometry of a planned tile grid.
///
/// Computed once per job and read-only afterwards; carried through to the
/// final run report.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GridMetadata {
    pub center_lat: f64,
    pub center_lon: f64,
    /// Ground resolution at the grid center, meters per pixel.
    pub meters_per_pixel: f64,
    /// Ground footprint of one tile edge, meters.
    pub meters_per_tile: f64,
    pub num_rows: u32,
    pub num_cols: u32,
    pub total_tiles: usize,
    pub zoom: u8,
    pub tile_size_px: u32,
}

/// Plans the tile grid covering the given bounding box.
///
/// Returns the row-major request list together with the grid metadata.
///
/// # Guarantees
///
/// - `requests.len() == metadata.total_tiles == num_rows * num_cols`
/// - `index` values form the contiguous range `0..total_tiles` with no gaps
///   or duplicates, in row-major order.
pub fn plan(
    lat_min: f64,
    lat_max: f64,
    lon_min: f64,
    lon_max: f64,
    zoom: u8,
    tile_size_px: u32,
) -> (Vec<TileRequest>, GridMetadata) {
    let center_lat = (lat_min + lat_max) / 2.0;
    let center_lon = (lon_min + lon_max) / 2.0;

    let meters_per_pixel = coord::meters_per_pixel(center_lat, zoom);
    let meters_per_tile = meters_per_pixel * tile_size_px as f64;

    let lat_meters = (lat_max - lat_min) * coord::METERS_PER_DEGREE;
    let lon_meters =
        (lon_max - lon_min) * coord::METERS_PER_DEGREE * center_lat.to_radians().cos();

    let num_rows = ((lat_meters / meters_per_tile).ceil() as u32).max(1);
    let num_cols = ((lon_meters / meters_per_tile).ceil() as u32).max(1);

    let center_px = coord::project(center_lat, center_lon, zoom);
    let step_px = tile_size_px as f64;

    let mut requests = Vec::with_capacity(num_rows as usize * num_cols as usize);
    for row in 0..num_rows {
        for col in 0..num_cols {
            let dx = (col as f64 - (num_cols as f64 - 1.0) / 2.0) * step_px;
            let dy = (row as f64 - (num_rows as f64 - 1.0) / 2.0) * step_px;
            let (lat, lon) = coord::unproject(
                PixelCoord {
                    x: center_px.x + dx,
                    y: center_px.y + dy,
                },
                zoom,
            );
            requests.push(TileRequest {
                lat,
                lon,
                row,
                col,
                index: row_major_index(row, col, num_cols),
            });
        }
    }

    let metadata = GridMetadata {
        center_lat,
        center_lon,
        meters_per_pixel,
        meters_per_tile,
        num_rows,
        num_cols,
        total_tiles: requests.len(),
        zoom,
        tile_size_px,
    };

    (requests, metadata)
}

/// Row-major index of a grid cell, widened to `usize` so the product cannot
/// overflow `u32` on planet-scale grids.
fn row_major_index(row: u32, col: u32, num_cols: u32) -> usize {
    row as usize * num_cols as usize + col as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_bounds_produce_six_by_six() {
        // Hand-computed from the meters-per-tile formula: the 0.006 x 0.010
        // degree box at zoom 19 with 640px tiles needs a 6x6 grid.
        let (requests, meta) = plan(50.447, 50.453, 30.520, 30.530, 19, 640);
        assert_eq!(meta.num_rows, 6);
        assert_eq!(meta.num_cols, 6);
        assert_eq!(meta.total_tiles, 36);
        assert_eq!(requests.len(), 36);
        assert!((meta.meters_per_pixel - 0.190_122_581).abs() < 1e-6);
        assert!((meta.meters_per_tile - 121.678_451_887).abs() < 1e-6);
    }

    #[test]
    fn test_metadata_center_is_bbox_midpoint() {
        let (_, meta) = plan(50.447, 50.453, 30.520, 30.530, 19, 640);
        assert!((meta.center_lat - 50.45).abs() < 1e-12);
        assert!((meta.center_lon - 30.525).abs() < 1e-12);
    }

    #[test]
    fn test_indices_are_row_major() {
        let (requests, meta) = plan(50.447, 50.453, 30.520, 30.530, 19, 640);
        for req in &requests {
            assert_eq!(req.index, (req.row * meta.num_cols + req.col) as usize);
        }
        // Row-major emission order matches the index order.
        for (i, req) in requests.iter().enumerate() {
            assert_eq!(req.index, i);
        }
    }

    #[test]
    fn test_grid_is_centered_on_midpoint() {
        let (requests, meta) = plan(50.447, 50.453, 30.520, 30.530, 19, 640);
        // The mean of all tile-center longitudes/latitudes must sit on the
        // bbox midpoint (the grid overhangs symmetrically).
        let mean_lat: f64 = requests.iter().map(|r| r.lat).sum::<f64>() / requests.len() as f64;
        let mean_lon: f64 = requests.iter().map(|r| r.lon).sum::<f64>() / requests.len() as f64;
        assert!((mean_lat - meta.center_lat).abs() < 1e-6);
        assert!((mean_lon - meta.center_lon).abs() < 1e-9);
    }

    #[test]
    fn test_index_arithmetic_is_wide_enough_for_planet_scale() {
        // 199_999 * 200_000 + 150_000 exceeds u32::MAX; the widened index
        // math must not wrap.
        let idx = row_major_index(199_999, 150_000, 200_000);
        assert_eq!(idx, 199_999usize * 200_000 + 150_000);
        assert!(idx > u32::MAX as usize);
    }

    #[test]
    fn test_tiny_box_still_yields_one_tile() {
        let (requests, meta) = plan(50.4500, 50.4501, 30.5200, 30.5201, 15, 640);
        assert_eq!(meta.num_rows, 1);
        assert_eq!(meta.num_cols, 1);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].index, 0);
    }

    #[test]
    fn test_neighboring_columns_step_east() {
        let (requests, meta) = plan(50.447, 50.453, 30.520, 30.530, 19, 640);
        let cols = meta.num_cols as usize;
        for row_start in (0..requests.len()).step_by(cols) {
            for pair in requests[row_start..row_start + cols].windows(2) {
                assert!(pair[1].lon > pair[0].lon);
            }
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_index_set_is_contiguous_permutation(
                lat in -60.0..60.0_f64,
                lat_extent in 0.001..0.05_f64,
                lon in -170.0..170.0_f64,
                lon_extent in 0.001..0.05_f64,
                zoom in 14u8..=20
            ) {
                let (requests, meta) =
                    plan(lat, lat + lat_extent, lon, lon + lon_extent, zoom, 640);

                prop_assert_eq!(
                    requests.len(),
                    (meta.num_rows * meta.num_cols) as usize
                );
                prop_assert_eq!(requests.len(), meta.total_tiles);

                let mut seen = vec![false; requests.len()];
                for req in &requests {
                    prop_assert!(req.index < requests.len());
                    prop_assert!(!seen[req.index], "duplicate index {}", req.index);
                    seen[req.index] = true;
                }
            }

            #[test]
            fn test_tile_centers_inside_mercator_range(
                lat in -60.0..60.0_f64,
                lon in -170.0..170.0_f64,
                zoom in 12u8..=20
            ) {
                let (requests, _) = plan(lat, lat + 0.01, lon, lon + 0.01, zoom, 640);
                for req in requests {
                    prop_assert!(req.lat > crate::coord::MIN_LAT);
                    prop_assert!(req.lat < crate::coord::MAX_LAT);
                    prop_assert!(req.lon >= -180.0 && req.lon <= 180.0);
                }
            }
        }
    }
}
