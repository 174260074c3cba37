//! Tile fetching.
//!
//! One [`TileFetcher`] turns a [`TileRequest`](crate::grid::TileRequest) into
//! a [`TileResult`]: build the (optionally signed) provider URL, GET it with
//! a bounded timeout, apply the retry table, decode the image, and trim the
//! watermark strip. Per-tile failures are absorbed here: a failed tile is a
//! `TileResult` with no payload, never an error that aborts the job.

mod config;
mod fetcher;
mod retry;

pub use config::{
    FetchConfig, DEFAULT_CROP_BOTTOM_PX, DEFAULT_MAX_RETRIES, DEFAULT_SCALE, DEFAULT_TILE_SIZE_PX,
    DEFAULT_ZOOM,
};
pub use fetcher::{AsyncTileFetcher, TileFetcher, TilePayload, TileResult, TileSource};
pub use retry::{backoff, classify, Disposition, FetchError, BACKOFF_BASE_MS, BACKOFF_CAP_MS};
