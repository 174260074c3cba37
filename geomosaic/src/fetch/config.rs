//! Fetch configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default zoom level for satellite tiles.
pub const DEFAULT_ZOOM: u8 = 19;

/// Default tile footprint in pixels (provider maximum for free tier).
pub const DEFAULT_TILE_SIZE_PX: u32 = 640;

/// Default scale factor (2 doubles the delivered pixel density).
pub const DEFAULT_SCALE: u8 = 2;

/// Default number of pixel rows trimmed from the tile bottom to remove the
/// provider watermark strip.
pub const DEFAULT_CROP_BOTTOM_PX: u32 = 40;

/// Default total attempts per tile (first try included).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Immutable fetch configuration, shared read-only across all workers.
///
/// Built once per job with the `with_*` builder methods:
///
/// ```
/// use geomosaic::fetch::FetchConfig;
///
/// let config = FetchConfig::new("api-key")
///     .with_zoom(19)
///     .with_max_retries(5);
/// assert_eq!(config.zoom, 19);
/// ```
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub zoom: u8,
    pub tile_size_px: u32,
    pub scale: u8,
    pub crop_bottom_px: u32,
    pub api_key: String,
    pub signing_secret: Option<String>,
    /// Total attempts per tile, first try included.
    pub max_retries: u32,
    pub timeout: Duration,
    /// When set, each fetched tile is written to this directory immediately
    /// after decode and only its path is kept in memory (streaming assembly).
    pub spool_dir: Option<PathBuf>,
}

impl FetchConfig {
    /// Creates a configuration with defaults for everything but the API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            tile_size_px: DEFAULT_TILE_SIZE_PX,
            scale: DEFAULT_SCALE,
            crop_bottom_px: DEFAULT_CROP_BOTTOM_PX,
            api_key: api_key.into(),
            signing_secret: None,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            spool_dir: None,
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

    pub fn with_scale(mut self, scale: u8) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_crop_bottom_px(mut self, crop_bottom_px: u32) -> Self {
        self.crop_bottom_px = crop_bottom_px;
        self
    }

    pub fn with_signing_secret(mut self, secret: impl Into<String>) -> Self {
        self.signing_secret = Some(secret.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_spool_dir(mut self, dir: PathBuf) -> Self {
        self.spool_dir = Some(dir);
        self
    }

    /// Edge length of a tile after scaling and watermark cropping.
    ///
    /// Tiles are trimmed square so the mosaic is a regular grid: the bottom
    /// `crop_bottom_px` rows (watermark) and the same number of right-edge
    /// columns are removed from the `tile_size_px * scale` delivery.
    pub fn cropped_px(&self) -> u32 {
        (self.tile_size_px * self.scale as u32).saturating_sub(self.crop_bottom_px)
    }

    /// Edge length of a tile as delivered by the provider.
    pub fn scaled_px(&self) -> u32 {
        self.tile_size_px * self.scale as u32
    }
}
