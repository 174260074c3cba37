//! Reference tile database.
//!
//! Resamples a finished mosaic into a fixed-spacing grid of square reference
//! tiles, each annotated with the geographic coordinates of its center and
//! local metric offsets from the mosaic center. Downstream matchers consume
//! the tiles plus the `reference.csv` / `metadata.json` sidecars; no further
//! provider requests are made.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::coord::{self, PixelCoord};

/// Default reference tile edge length in pixels.
pub const DEFAULT_REF_TILE_PX: u32 = 500;

/// Default grid spacing in meters.
pub const DEFAULT_SPACING_M: f64 = 40.0;

/// JPEG quality for saved reference tiles.
const JPEG_QUALITY: u8 = 95;

#[derive(Debug, Error)]
pub enum RefGridError {
    /// The mosaic cannot fit even one reference tile.
    #[error("mosaic {width}x{height} too small for {tile_size_px}px reference tiles")]
    MosaicTooSmall {
        width: u32,
        height: u32,
        tile_size_px: u32,
    },

    #[error("failed to write reference dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode reference tile: {0}")]
    Image(#[from] image::ImageError),

    #[error("failed to write metadata: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parameters for reference grid extraction.
#[derive(Debug, Clone)]
pub struct RefGridConfig {
    /// Geographic center of the mosaic.
    pub center_lat: f64,
    pub center_lon: f64,
    /// Zoom level the mosaic was fetched at.
    pub zoom: u8,
    /// Reference tile edge length in pixels.
    pub tile_size_px: u32,
    /// Grid spacing in meters.
    pub spacing_m: f64,
    /// Tile overlap ratio in `[0, 1)`; 0.5 halves the step.
    pub overlap: f64,
}

impl RefGridConfig {
    pub fn new(center_lat: f64, center_lon: f64) -> Self {
        Self {
            center_lat,
            center_lon,
            zoom: crate::fetch::DEFAULT_ZOOM,
            tile_size_px: DEFAULT_REF_TILE_PX,
            spacing_m: DEFAULT_SPACING_M,
            overlap: 0.0,
        }
    }

    pub fn with_zoom(mut self, zoom: u8) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_tile_size_px(mut self, tile_size_px: u32) -> Self {
        self.tile_size_px = tile_size_px;
        self
    }

    pub fn with_spacing_m(mut self, spacing_m: f64) -> Self {
        self.spacing_m = spacing_m;
        self
    }

    pub fn with_overlap(mut self, overlap: f64) -> Self {
        self.overlap = overlap.clamp(0.0, 0.99);
        self
    }
}

/// One extracted reference tile and its geo annotations.
#[derive(Debug, Clone, Serialize)]
pub struct RefTile {
    /// Image file name under `reference_images/`.
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Meters east of the mosaic center.
    pub x: f64,
    /// Meters north of the mosaic center.
    pub y: f64,
    pub row: u32,
    pub col: u32,
}

/// Dataset-level metadata, written as `metadata.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RefGridMetadata {
    pub mosaic_size: [u32; 2],
    pub tile_size_px: u32,
    pub spacing_m: f64,
    pub spacing_px: u32,
    pub step_px: u32,
    pub overlap: f64,
    pub zoom: u8,
    pub meters_per_pixel: f64,
    pub center_lat: f64,
    pub center_lon: f64,
    pub grid_rows: u32,
    pub grid_cols: u32,
    pub total_refs: usize,
}

/// Output of [`build`]: the per-tile records plus dataset metadata.
#[derive(Debug, Clone)]
pub struct RefGridReport {
    pub tiles: Vec<RefTile>,
    pub metadata: RefGridMetadata,
    /// Directory the tiles and sidecars were written to.
    pub output_dir: PathBuf,
}

/// Extracts a reference tile dataset from `mosaic` into `output_dir`.
///
/// Tiles are square crops of `tile_size_px` sampled at `spacing_m` intervals
/// (converted to pixels at the mosaic's resolution), inset by half a tile so
/// every crop lies fully inside the mosaic. Grid positions whose crop would
/// extend past the right or bottom edge are skipped. Writes
/// `reference_images/ref_NNNNNN.jpg`, `reference.csv` and `metadata.json`.
///
/// # Errors
///
/// [`RefGridError::MosaicTooSmall`] when the mosaic cannot fit a single
/// tile, or an I/O / encoding error from writing the dataset.
pub fn build(
    mosaic: &RgbImage,
    output_dir: &Path,
    config: &RefGridConfig,
) -> Result<RefGridReport, RefGridError> {
    let (mosaic_w, mosaic_h) = mosaic.dimensions();
    let tile = config.tile_size_px;

    if mosaic_w <= tile || mosaic_h <= tile {
        return Err(RefGridError::MosaicTooSmall {
            width: mosaic_w,
            height: mosaic_h,
            tile_size_px: tile,
        });
    }

    let meters_per_pixel = coord::meters_per_pixel(config.center_lat, config.zoom);
    let spacing_px = ((config.spacing_m / meters_per_pixel) as u32).max(1);
    let step_px = ((spacing_px as f64 * (1.0 - config.overlap)) as u32).max(1);

    let margin = tile / 2;
    let usable_w = mosaic_w - tile;
    let usable_h = mosaic_h - tile;
    let num_cols = usable_w / step_px + 1;
    let num_rows = usable_h / step_px + 1;

    info!(
        mosaic_w,
        mosaic_h,
        tile,
        spacing_px,
        step_px,
        rows = num_rows,
        cols = num_cols,
        "building reference grid"
    );

    let img_dir = output_dir.join("reference_images");
    std::fs::create_dir_all(&img_dir)?;

    // Mosaic origin in world pixel coordinates, from its geographic center.
    let center_px = coord::project(config.center_lat, config.center_lon, config.zoom);
    let mosaic_x_min = center_px.x - f64::from(mosaic_w) / 2.0;
    let mosaic_y_min = center_px.y - f64::from(mosaic_h) / 2.0;

    let mut tiles = Vec::new();
    for row in 0..num_rows {
        for col in 0..num_cols {
            let x1 = margin + col * step_px;
            let y1 = margin + row * step_px;
            if x1 + tile > mosaic_w || y1 + tile > mosaic_h {
                continue;
            }
            let tile_cx = x1 + tile / 2;
            let tile_cy = y1 + tile / 2;

            let crop = image::imageops::crop_imm(mosaic, x1, y1, tile, tile).to_image();
            let name = format!("ref_{:06}.jpg", tiles.len());
            let file = BufWriter::new(File::create(img_dir.join(&name))?);
            crop.write_with_encoder(JpegEncoder::new_with_quality(file, JPEG_QUALITY))?;

            let (latitude, longitude) = coord::unproject(
                PixelCoord {
                    x: mosaic_x_min + f64::from(tile_cx),
                    y: mosaic_y_min + f64::from(tile_cy),
                },
                config.zoom,
            );

            // Local metric frame: origin at the mosaic center, y points north.
            let local_x = (f64::from(tile_cx) - f64::from(mosaic_w) / 2.0) * meters_per_pixel;
            let local_y = (f64::from(mosaic_h) / 2.0 - f64::from(tile_cy)) * meters_per_pixel;

            debug!(row, col, %name, "reference tile extracted");
            tiles.push(RefTile {
                name,
                latitude,
                longitude,
                x: local_x,
                y: local_y,
                row,
                col,
            });
        }
    }

    write_csv(&output_dir.join("reference.csv"), &tiles)?;

    let metadata = RefGridMetadata {
        mosaic_size: [mosaic_w, mosaic_h],
        tile_size_px: tile,
        spacing_m: config.spacing_m,
        spacing_px,
        step_px,
        overlap: config.overlap,
        zoom: config.zoom,
        meters_per_pixel,
        center_lat: config.center_lat,
        center_lon: config.center_lon,
        grid_rows: num_rows,
        grid_cols: num_cols,
        total_refs: tiles.len(),
    };
    let meta_file = BufWriter::new(File::create(output_dir.join("metadata.json"))?);
    serde_json::to_writer_pretty(meta_file, &metadata)?;

    info!(total_refs = tiles.len(), dir = %output_dir.display(), "reference grid written");
    Ok(RefGridReport {
        tiles,
        metadata,
        output_dir: output_dir.to_path_buf(),
    })
}

fn write_csv(path: &Path, tiles: &[RefTile]) -> Result<(), std::io::Error> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "name,latitude,longitude,x,y")?;
    for tile in tiles {
        writeln!(
            file,
            "{},{},{},{},{}",
            tile.name, tile.latitude, tile.longitude, tile.x, tile.y
        )?;
    }
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Equator resolution at zoom 19, ~0.2986 m/px.
    fn config() -> RefGridConfig {
        RefGridConfig::new(0.0, 0.0)
            .with_zoom(19)
            .with_tile_size_px(16)
            .with_spacing_m(2.0)
    }

    fn gradient_mosaic(size: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 0])
        })
    }

    #[test]
    fn test_rejects_mosaic_smaller_than_one_tile() {
        let dir = tempfile::tempdir().unwrap();
        let err = build(&gradient_mosaic(16), dir.path(), &config()).unwrap_err();
        assert!(matches!(
            err,
            RefGridError::MosaicTooSmall {
                width: 16,
                height: 16,
                tile_size_px: 16
            }
        ));
    }

    #[test]
    fn test_edge_overflowing_positions_are_skipped() {
        // spacing 2.0m / 0.2986 m/px truncates to a 6px step. A 64px mosaic
        // with 16px tiles has 48px usable, so 9 grid columns are planned but
        // cols 7 and 8 would crop past the edge and are skipped: 7x7 kept.
        let dir = tempfile::tempdir().unwrap();
        let report = build(&gradient_mosaic(64), dir.path(), &config()).unwrap();

        assert_eq!(report.metadata.step_px, 6);
        assert_eq!(report.metadata.grid_rows, 9);
        assert_eq!(report.metadata.grid_cols, 9);
        assert_eq!(report.metadata.total_refs, 49);
        assert_eq!(report.tiles.len(), 49);
        assert!(report
            .tiles
            .iter()
            .all(|t| t.row <= 6 && t.col <= 6));
    }

    #[test]
    fn test_sidecars_and_images_written() {
        let dir = tempfile::tempdir().unwrap();
        let report = build(&gradient_mosaic(64), dir.path(), &config()).unwrap();

        assert!(dir.path().join("reference.csv").is_file());
        assert!(dir.path().join("metadata.json").is_file());
        assert!(dir
            .path()
            .join("reference_images")
            .join("ref_000000.jpg")
            .is_file());

        let csv = std::fs::read_to_string(dir.path().join("reference.csv")).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("name,latitude,longitude,x,y"));
        assert_eq!(lines.count(), report.tiles.len());

        let meta: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("metadata.json")).unwrap())
                .unwrap();
        assert_eq!(meta["mosaic_size"], serde_json::json!([64, 64]));
        assert_eq!(meta["total_refs"], serde_json::json!(49));
    }

    #[test]
    fn test_local_frame_is_centered_and_north_up() {
        let dir = tempfile::tempdir().unwrap();
        let report = build(&gradient_mosaic(64), dir.path(), &config()).unwrap();

        // First tile sits in the north-west quadrant.
        let first = &report.tiles[0];
        assert!(first.x < 0.0);
        assert!(first.y > 0.0);

        // Moving east increases x and longitude, moving south decreases y
        // and latitude.
        let east = report.tiles.iter().find(|t| t.row == 0 && t.col == 1).unwrap();
        assert!(east.x > first.x);
        assert!(east.longitude > first.longitude);
        let south = report.tiles.iter().find(|t| t.row == 1 && t.col == 0).unwrap();
        assert!(south.y < first.y);
        assert!(south.latitude < first.latitude);
    }

    #[test]
    fn test_overlap_halves_the_step() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config().with_overlap(0.5);
        let report = build(&gradient_mosaic(64), dir.path(), &cfg).unwrap();
        assert_eq!(report.metadata.spacing_px, 6);
        assert_eq!(report.metadata.step_px, 3);
        assert!(report.metadata.total_refs > 49);
    }

    #[test]
    fn test_overlap_clamped_to_unit_interval_below_one() {
        assert_eq!(RefGridConfig::new(0.0, 0.0).with_overlap(1.5).overlap, 0.99);
        assert_eq!(RefGridConfig::new(0.0, 0.0).with_overlap(0.99).overlap, 0.99);
        assert_eq!(RefGridConfig::new(0.0, 0.0).with_overlap(-0.2).overlap, 0.0);
    }

    #[test]
    fn test_crops_match_mosaic_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let mosaic = gradient_mosaic(64);
        let report = build(&mosaic, dir.path(), &config()).unwrap();

        let first = &report.tiles[0];
        let path = dir.path().join("reference_images").join(&first.name);
        let tile = image::open(path).unwrap().to_rgb8();
        assert_eq!(tile.dimensions(), (16, 16));
        // JPEG at quality 95 stays within a small tolerance of the source.
        let src = mosaic.get_pixel(8, 8).0;
        let got = tile.get_pixel(0, 0).0;
        for (s, g) in src.iter().zip(got.iter()) {
            assert!((i16::from(*s) - i16::from(*g)).abs() <= 12);
        }
    }
}
