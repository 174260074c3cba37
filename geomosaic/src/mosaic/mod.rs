//! Mosaic assembly.
//!
//! Composites fetched tiles into the final raster. The canvas size is a pure
//! function of the grid metadata and the cropped tile footprint; it never
//! depends on which tiles succeeded. Failed slots keep the black canvas
//! background.
//!
//! Payloads arrive either decoded in memory or as spooled per-tile files
//! (streaming mode). Both paths go through the same placement routine, so
//! the two modes compose identically; streaming merely reads one tile file
//! at a time to bound peak memory at O(tile) instead of O(mosaic).

use image::RgbImage;
use tracing::{debug, warn};

use crate::fetch::{TilePayload, TileResult};
use crate::grid::GridMetadata;

/// Tile count above which `AssemblyMode::Auto` switches to streaming.
pub const STREAMING_THRESHOLD_TILES: usize = 256;

/// How tile payloads are held between fetch and assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyMode {
    /// Pick [`InMemory`](AssemblyMode::InMemory) for small grids and
    /// [`Streaming`](AssemblyMode::Streaming) above
    /// [`STREAMING_THRESHOLD_TILES`].
    Auto,
    /// Hold every decoded tile in memory until assembly.
    InMemory,
    /// Spool each tile to disk right after fetch; assembly reads the files
    /// back one at a time.
    Streaming,
}

impl AssemblyMode {
    /// Resolves `Auto` against the grid size.
    pub fn resolve(self, total_tiles: usize) -> AssemblyMode {
        match self {
            AssemblyMode::Auto if total_tiles > STREAMING_THRESHOLD_TILES => {
                AssemblyMode::Streaming
            }
            AssemblyMode::Auto => AssemblyMode::InMemory,
            explicit => explicit,
        }
    }
}

/// Composites tile results into the output raster.
#[derive(Debug, Clone)]
pub struct MosaicAssembler {
    num_rows: u32,
    num_cols: u32,
    cropped_px: u32,
}

impl MosaicAssembler {
    /// Creates an assembler for the given grid and cropped tile edge length.
    pub fn new(metadata: &GridMetadata, cropped_px: u32) -> Self {
        Self {
            num_rows: metadata.num_rows,
            num_cols: metadata.num_cols,
            cropped_px,
        }
    }

    /// Output dimensions in pixels: `(width, height)`.
    ///
    /// A pure function of the grid geometry; identical for a fully
    /// successful run and one with failures.
    pub fn dimensions(&self) -> (u32, u32) {
        (
            self.num_cols * self.cropped_px,
            self.num_rows * self.cropped_px,
        )
    }

    /// Composites the results into the final raster.
    ///
    /// Each successful tile is placed at
    /// `(col * cropped_px, row * cropped_px)`; failed slots stay black.
    /// Placement rectangles are disjoint, so the result does not depend on
    /// the order of `results`. Spooled tiles are read and dropped one at a
    /// time; an unreadable spool file degrades to a blank slot rather than
    /// failing the job.
    pub fn assemble(&self, results: &[TileResult]) -> RgbImage {
        let (width, height) = self.dimensions();
        let mut canvas = RgbImage::from_pixel(width, height, image::Rgb([0, 0, 0]));
        debug!(width, height, tiles = results.len(), "assembling mosaic");

        for result in results {
            let Some(payload) = &result.payload else {
                continue;
            };
            let x = (result.col * self.cropped_px) as i64;
            let y = (result.row * self.cropped_px) as i64;

            match payload {
                TilePayload::Decoded(tile) => {
                    image::imageops::replace(&mut canvas, tile, x, y);
                }
                TilePayload::OnDisk(path) => match image::open(path) {
                    Ok(tile) => {
                        image::imageops::replace(&mut canvas, &tile.to_rgb8(), x, y);
                    }
                    Err(e) => {
                        warn!(index = result.index, path = %path.display(), error = %e,
                              "failed to read spooled tile, leaving slot blank");
                    }
                },
            }
        }

        canvas
    }
}
