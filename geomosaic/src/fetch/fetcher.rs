//! The tile fetcher: URL build, retry loop, decode, crop, spool.

use std::path::PathBuf;

use image::RgbImage;
use tracing::{debug, warn};

use crate::grid::TileRequest;
use crate::provider::{build_tile_url, AsyncHttpClient, HttpClient, StaticMapParams};

use super::config::FetchConfig;
use super::retry::{backoff, classify, Disposition, FetchError};

/// Payload of a successfully fetched tile.
#[derive(Debug, Clone)]
pub enum TilePayload {
    /// Decoded, cropped image held in memory.
    Decoded(RgbImage),
    /// Tile written to the spool directory; only the path is retained.
    OnDisk(PathBuf),
}

/// Outcome of fetching one tile.
///
/// Exactly one result exists per request under every strategy. A failed
/// fetch carries no payload; its grid slot is left as canvas background.
#[derive(Debug, Clone)]
pub struct TileResult {
    pub row: u32,
    pub col: u32,
    pub index: usize,
    pub payload: Option<TilePayload>,
}

impl TileResult {
    /// Result for a tile that could not be fetched.
    pub fn failed(request: &TileRequest) -> Self {
        Self {
            row: request.row,
            col: request.col,
            index: request.index,
            payload: None,
        }
    }

    pub fn success(&self) -> bool {
        self.payload.is_some()
    }
}

/// Anything that can resolve a [`TileRequest`] into a [`TileResult`].
///
/// Implemented by [`TileFetcher`]; strategies and tests depend on this trait
/// rather than on a concrete fetcher.
pub trait TileSource: Send + Sync {
    fn fetch_tile(&self, request: &TileRequest) -> TileResult;
}

/// Blocking tile fetcher.
///
/// Owns its transport (dependency-injected, no global state) and a shared
/// read-only [`FetchConfig`]. Safe to share across worker threads by
/// reference.
pub struct TileFetcher<C: HttpClient> {
    client: C,
    config: FetchConfig,
}

impl<C: HttpClient> TileFetcher<C> {
    pub fn new(client: C, config: FetchConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetches one tile, absorbing all per-tile failures.
    pub fn fetch(&self, request: &TileRequest) -> TileResult {
        match self.try_fetch(request) {
            Ok(payload) => TileResult {
                row: request.row,
                col: request.col,
                index: request.index,
                payload: Some(payload),
            },
            Err(e) => {
                warn!(index = request.index, error = %e, "tile fetch failed");
                TileResult::failed(request)
            }
        }
    }

    fn try_fetch(&self, request: &TileRequest) -> Result<TilePayload, FetchError> {
        let url = tile_url(request, &self.config)?;

        let mut attempt = 0;
        loop {
            match classify(self.client.get(&url)) {
                Disposition::Success(bytes) => {
                    let image = decode_and_crop(&bytes, &self.config)?;
                    return spool_or_keep(image, request, &self.config);
                }
                Disposition::Permanent(e) => return Err(e),
                Disposition::Retryable(e) => {
                    attempt += 1;
                    if attempt >= self.config.max_retries {
                        return Err(e);
                    }
                    debug!(index = request.index, attempt, error = %e, "retrying tile");
                    std::thread::sleep(backoff(attempt - 1));
                }
            }
        }
    }
}

impl<C: HttpClient> TileSource for TileFetcher<C> {
    fn fetch_tile(&self, request: &TileRequest) -> TileResult {
        self.fetch(request)
    }
}

/// Non-blocking tile fetcher for the async-semaphore strategy.
///
/// Identical retry/decode behavior to [`TileFetcher`]; only the waiting
/// primitive differs (`tokio::time::sleep` instead of a blocked thread).
pub struct AsyncTileFetcher<C: AsyncHttpClient> {
    client: C,
    config: FetchConfig,
}

impl<C: AsyncHttpClient> AsyncTileFetcher<C> {
    pub fn new(client: C, config: FetchConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetches one tile, absorbing all per-tile failures.
    pub async fn fetch(&self, request: &TileRequest) -> TileResult {
        match self.try_fetch(request).await {
            Ok(payload) => TileResult {
                row: request.row,
                col: request.col,
                index: request.index,
                payload: Some(payload),
            },
            Err(e) => {
                warn!(index = request.index, error = %e, "tile fetch failed");
                TileResult::failed(request)
            }
        }
    }

    async fn try_fetch(&self, request: &TileRequest) -> Result<TilePayload, FetchError> {
        let url = tile_url(request, &self.config)?;

        let mut attempt = 0;
        loop {
            match classify(self.client.get(&url).await) {
                Disposition::Success(bytes) => {
                    let image = decode_and_crop(&bytes, &self.config)?;
                    return spool_or_keep(image, request, &self.config);
                }
                Disposition::Permanent(e) => return Err(e),
                Disposition::Retryable(e) => {
                    attempt += 1;
                    if attempt >= self.config.max_retries {
                        return Err(e);
                    }
                    debug!(index = request.index, attempt, error = %e, "retrying tile");
                    tokio::time::sleep(backoff(attempt - 1)).await;
                }
            }
        }
    }
}

fn tile_url(request: &TileRequest, config: &FetchConfig) -> Result<String, FetchError> {
    build_tile_url(
        request.lat,
        request.lon,
        &StaticMapParams {
            zoom: config.zoom,
            tile_size_px: config.tile_size_px,
            scale: config.scale,
            api_key: &config.api_key,
            signing_secret: config.signing_secret.as_deref(),
        },
    )
    .map_err(|e| FetchError::UrlBuild(e.to_string()))
}

/// Decodes the tile bytes and trims it to the cropped square footprint.
///
/// The bottom `crop_bottom_px` rows carry the provider watermark; the same
/// number of right-edge columns is trimmed so tiles tile the mosaic without
/// overlap. Crops are clamped to the decoded dimensions, so undersized
/// responses still produce a (smaller) valid image.
fn decode_and_crop(bytes: &[u8], config: &FetchConfig) -> Result<RgbImage, FetchError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| FetchError::DecodeFailed(e.to_string()))?
        .to_rgb8();

    let cropped_px = config.cropped_px();
    let width = cropped_px.min(decoded.width());
    let height = cropped_px.min(decoded.height());
    if width == decoded.width() && height == decoded.height() {
        return Ok(decoded);
    }

    Ok(image::imageops::crop_imm(&decoded, 0, 0, width, height).to_image())
}

/// Keeps the decoded tile in memory, or writes it to the spool directory and
/// keeps only its path (streaming assembly mode).
fn spool_or_keep(
    image: RgbImage,
    request: &TileRequest,
    config: &FetchConfig,
) -> Result<TilePayload, FetchError> {
    match &config.spool_dir {
        None => Ok(TilePayload::Decoded(image)),
        Some(dir) => {
            let path = dir.join(format!("tile_{:05}.jpg", request.index));
            image
                .save(&path)
                .map_err(|e| FetchError::SpoolWrite(e.to_string()))?;
            Ok(TilePayload::OnDisk(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::tests::{MockAsyncHttpClient, MockHttpClient};
    use crate::provider::{HttpResponse, TransportError};
    use std::io::Cursor;

    fn request() -> TileRequest {
        TileRequest {
            lat: 50.45,
            lon: 30.525,
            row: 1,
            col: 2,
            index: 8,
        }
    }

    /// Encodes a solid-color PNG of the given size.
    fn image_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([120, 90, 60]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn image_ok(width: u32, height: u32) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status: 200,
            content_type: Some("image/png".to_string()),
            body: image_bytes(width, height),
        })
    }

    fn status(code: u16) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status: code,
            content_type: Some("text/plain".to_string()),
            body: vec![],
        })
    }

    fn test_config() -> FetchConfig {
        // 64px tiles, scale 1, 8px watermark crop -> 56px cropped square.
        FetchConfig::new("test-key")
            .with_tile_size_px(64)
            .with_scale(1)
            .with_crop_bottom_px(8)
    }

    #[test]
    fn test_success_decodes_and_crops_square() {
        let mock = MockHttpClient::new(vec![image_ok(64, 64)]);
        let fetcher = TileFetcher::new(mock, test_config());

        let result = fetcher.fetch(&request());
        assert!(result.success());
        assert_eq!(result.index, 8);
        match result.payload.unwrap() {
            TilePayload::Decoded(img) => {
                assert_eq!(img.width(), 56);
                assert_eq!(img.height(), 56);
            }
            TilePayload::OnDisk(_) => panic!("expected in-memory payload"),
        }
    }

    #[test]
    fn test_http_403_fails_after_exactly_one_attempt() {
        let mock = MockHttpClient::new(vec![status(403)]);
        let fetcher = TileFetcher::new(mock, test_config().with_max_retries(5));

        let result = fetcher.fetch(&request());
        assert!(!result.success());
        assert_eq!(fetcher.client.calls(), 1, "4xx must not be retried");
    }

    #[test]
    fn test_non_image_200_fails_without_retry() {
        let mock = MockHttpClient::new(vec![status(200)]);
        let fetcher = TileFetcher::new(mock, test_config().with_max_retries(5));

        let result = fetcher.fetch(&request());
        assert!(!result.success());
        assert_eq!(fetcher.client.calls(), 1);
    }

    #[test]
    fn test_429_retries_until_success() {
        let mock = MockHttpClient::new(vec![status(429), status(429), image_ok(64, 64)]);
        let fetcher = TileFetcher::new(mock, test_config());

        let result = fetcher.fetch(&request());
        assert!(result.success());
        assert_eq!(fetcher.client.calls(), 3);
    }

    #[test]
    fn test_5xx_exhausts_retries_and_fails() {
        let mock = MockHttpClient::new(vec![status(503)]);
        let fetcher = TileFetcher::new(mock, test_config().with_max_retries(3));

        let result = fetcher.fetch(&request());
        assert!(!result.success());
        assert_eq!(fetcher.client.calls(), 3, "transient errors use all attempts");
    }

    #[test]
    fn test_transport_error_then_success() {
        let mock = MockHttpClient::new(vec![
            Err(TransportError::Request("connection reset".into())),
            image_ok(64, 64),
        ]);
        let fetcher = TileFetcher::new(mock, test_config());

        assert!(fetcher.fetch(&request()).success());
        assert_eq!(fetcher.client.calls(), 2);
    }

    #[test]
    fn test_undecodable_image_fails() {
        let mock = MockHttpClient::new(vec![Ok(HttpResponse {
            status: 200,
            content_type: Some("image/jpeg".to_string()),
            body: vec![0xDE, 0xAD, 0xBE, 0xEF],
        })]);
        let fetcher = TileFetcher::new(mock, test_config());

        assert!(!fetcher.fetch(&request()).success());
    }

    #[test]
    fn test_spool_mode_writes_file_and_returns_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config().with_spool_dir(dir.path().to_path_buf());
        let mock = MockHttpClient::new(vec![image_ok(64, 64)]);
        let fetcher = TileFetcher::new(mock, config);

        let result = fetcher.fetch(&request());
        match result.payload.unwrap() {
            TilePayload::OnDisk(path) => {
                assert!(path.exists());
                assert_eq!(path.file_name().unwrap(), "tile_00008.jpg");
                let reloaded = image::open(&path).unwrap().to_rgb8();
                assert_eq!(reloaded.dimensions(), (56, 56));
            }
            TilePayload::Decoded(_) => panic!("expected on-disk payload"),
        }
    }

    #[test]
    fn test_undersized_response_is_clamped_not_rejected() {
        // Provider returned a 40x40 image although 64 was requested.
        let mock = MockHttpClient::new(vec![image_ok(40, 40)]);
        let fetcher = TileFetcher::new(mock, test_config());

        let result = fetcher.fetch(&request());
        match result.payload.unwrap() {
            TilePayload::Decoded(img) => assert_eq!(img.dimensions(), (40, 40)),
            TilePayload::OnDisk(_) => panic!("expected in-memory payload"),
        }
    }

    #[tokio::test]
    async fn test_async_fetcher_matches_blocking_behavior() {
        let mock = MockAsyncHttpClient::new(vec![status(429), image_ok(64, 64)]);
        let fetcher = AsyncTileFetcher::new(mock, test_config());

        let result = fetcher.fetch(&request()).await;
        assert!(result.success());
        assert_eq!(fetcher.client.calls(), 2);
    }

    #[tokio::test]
    async fn test_async_permanent_failure_single_attempt() {
        let mock = MockAsyncHttpClient::new(vec![status(404)]);
        let fetcher = AsyncTileFetcher::new(mock, test_config().with_max_retries(4));

        let result = fetcher.fetch(&request()).await;
        assert!(!result.success());
        assert_eq!(fetcher.client.calls(), 1);
    }
}
