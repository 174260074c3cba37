//! Job orchestration.
//!
//! A [`MosaicJob`] wires the pipeline end to end: plan the grid, drain the
//! request list with the configured concurrency strategy, enforce the
//! success floor, and composite the mosaic. The caller gets the final image
//! plus a [`RunReport`] of the grid geometry and run statistics.

use std::path::PathBuf;
use std::time::Instant;

use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::fetch::{AsyncTileFetcher, FetchConfig, TileFetcher, TileResult};
use crate::grid::{self, GridMetadata, TileRequest};
use crate::mosaic::{AssemblyMode, MosaicAssembler};
use crate::provider::{AsyncReqwestClient, ReqwestClient, TransportError};
use crate::strategy::{
    AsyncSemaphoreStrategy, FetchStrategy, PartitionedStrategy, SequentialStrategy, StrategyError,
    StrategyKind, TooManyFailures, WorkerPoolStrategy, DEFAULT_MAX_IN_FLIGHT, DEFAULT_WORKERS,
};

/// A job-fatal error. Per-tile failures never surface here.
#[derive(Debug, Error)]
pub enum JobError {
    /// No API key configured; detected before any request is issued.
    #[error("no API key configured")]
    MissingApiKey,

    #[error(transparent)]
    TooManyFailures(#[from] TooManyFailures),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The streaming spool directory could not be created.
    #[error("failed to create spool directory: {0}")]
    Spool(#[from] std::io::Error),
}

/// Everything a mosaic run needs, bounds through assembly mode.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    pub fetch: FetchConfig,
    pub strategy: StrategyKind,
    /// Worker count for the pool and partitioned strategies.
    pub workers: usize,
    /// Concurrency cap for the async-semaphore strategy.
    pub max_in_flight: usize,
    pub assembly: AssemblyMode,
    /// Parent directory for the streaming spool; `None` uses the system
    /// temp directory.
    pub spool_parent: Option<PathBuf>,
}

impl JobConfig {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64, fetch: FetchConfig) -> Self {
        Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
            fetch,
            strategy: StrategyKind::WorkerPool,
            workers: DEFAULT_WORKERS,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            assembly: AssemblyMode::Auto,
            spool_parent: None,
        }
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn with_assembly(mut self, assembly: AssemblyMode) -> Self {
        self.assembly = assembly;
        self
    }

    pub fn with_spool_parent(mut self, parent: PathBuf) -> Self {
        self.spool_parent = Some(parent);
        self
    }

    /// Degree of parallelism the configured strategy will use.
    pub fn parallelism(&self) -> usize {
        match self.strategy {
            StrategyKind::Sequential => 1,
            StrategyKind::WorkerPool | StrategyKind::Partitioned => self.workers,
            StrategyKind::AsyncSemaphore => self.max_in_flight,
        }
    }
}

/// Statistics and geometry of a completed run, serializable as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub grid: GridMetadata,
    pub strategy: &'static str,
    pub workers: usize,
    pub tiles_total: usize,
    pub tiles_success: usize,
    pub elapsed_secs: f64,
    pub tiles_per_sec: f64,
}

/// Result of a successful job: the mosaic and its run report.
#[derive(Debug)]
pub struct JobOutput {
    pub mosaic: RgbImage,
    pub report: RunReport,
}

/// One end-to-end mosaic generation run.
pub struct MosaicJob {
    config: JobConfig,
}

impl MosaicJob {
    pub fn new(config: JobConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Runs the full pipeline against the live tile provider.
    ///
    /// Builds the HTTP transport and the configured strategy, then drives
    /// the shared plan/fetch/finalize/assemble path. In streaming mode the
    /// per-tile spool directory is a temporary directory removed when the
    /// run ends, on both the success and the error path.
    pub fn run(&self) -> Result<JobOutput, JobError> {
        if self.config.fetch.api_key.is_empty() {
            return Err(JobError::MissingApiKey);
        }

        match self.config.strategy {
            StrategyKind::Sequential => self.execute(|fetch| {
                let fetcher = Self::live_fetcher(fetch)?;
                Ok(Box::new(SequentialStrategy::new(fetcher)) as Box<dyn FetchStrategy>)
            }),
            StrategyKind::WorkerPool => self.execute(|fetch| {
                let fetcher = Self::live_fetcher(fetch)?;
                let strategy = WorkerPoolStrategy::new(fetcher, self.config.workers)?;
                Ok(Box::new(strategy) as Box<dyn FetchStrategy>)
            }),
            StrategyKind::AsyncSemaphore => self.execute(|fetch| {
                let client = AsyncReqwestClient::with_timeout(fetch.timeout)?;
                let fetcher = AsyncTileFetcher::new(client, fetch);
                let strategy = AsyncSemaphoreStrategy::new(fetcher, self.config.max_in_flight);
                Ok(Box::new(strategy) as Box<dyn FetchStrategy>)
            }),
            StrategyKind::Partitioned => self.execute(|fetch| {
                let fetcher = Self::live_fetcher(fetch)?;
                let strategy = PartitionedStrategy::new(fetcher, self.config.workers);
                Ok(Box::new(strategy) as Box<dyn FetchStrategy>)
            }),
        }
    }

    fn live_fetcher(fetch: FetchConfig) -> Result<TileFetcher<ReqwestClient>, JobError> {
        let client = ReqwestClient::with_timeout(fetch.timeout)?;
        Ok(TileFetcher::new(client, fetch))
    }

    /// Plans the grid, sets up the streaming spool when the resolved
    /// assembly mode needs one, and drives the strategy produced by `build`.
    ///
    /// The spool is a temporary directory owned by this frame; dropping it
    /// removes the tile files and the directory on both the success and the
    /// error path.
    fn execute<F>(&self, build: F) -> Result<JobOutput, JobError>
    where
        F: FnOnce(FetchConfig) -> Result<Box<dyn FetchStrategy>, JobError>,
    {
        let (requests, metadata) = self.plan();
        let mode = self.config.assembly.resolve(metadata.total_tiles);

        let mut fetch = self.config.fetch.clone();
        let spool = match mode {
            AssemblyMode::Streaming => {
                let dir = match &self.config.spool_parent {
                    Some(parent) => tempfile::tempdir_in(parent)?,
                    None => tempfile::tempdir()?,
                };
                fetch = fetch.with_spool_dir(dir.path().to_path_buf());
                Some(dir)
            }
            _ => None,
        };

        let started = Instant::now();
        let output = build(fetch).and_then(|strategy| {
            let results = strategy.run(&requests)?;
            self.compose(metadata, results, strategy.name(), started)
        });
        drop(spool);
        output
    }

    /// Runs the pipeline with a caller-supplied strategy.
    ///
    /// The strategy owns its fetcher, so the payload mode (in-memory or
    /// spooled) follows whatever its fetcher was configured with.
    pub fn run_with(&self, strategy: &dyn FetchStrategy) -> Result<JobOutput, JobError> {
        if self.config.fetch.api_key.is_empty() {
            return Err(JobError::MissingApiKey);
        }
        let (requests, metadata) = self.plan();
        let started = Instant::now();
        let results = strategy.run(&requests)?;
        self.compose(metadata, results, strategy.name(), started)
    }

    fn plan(&self) -> (Vec<TileRequest>, GridMetadata) {
        grid::plan(
            self.config.lat_min,
            self.config.lat_max,
            self.config.lon_min,
            self.config.lon_max,
            self.config.fetch.zoom,
            self.config.fetch.tile_size_px,
        )
    }

    fn compose(
        &self,
        metadata: GridMetadata,
        results: Vec<TileResult>,
        strategy: &'static str,
        started: Instant,
    ) -> Result<JobOutput, JobError> {
        let batch = match crate::strategy::finalize(results) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(succeeded = e.succeeded, total = e.total, "aborting assembly");
                return Err(e.into());
            }
        };

        let assembler = MosaicAssembler::new(&metadata, self.config.fetch.cropped_px());
        let mosaic = assembler.assemble(&batch.results);

        let elapsed = started.elapsed().as_secs_f64();
        let report = RunReport {
            strategy,
            workers: self.config.parallelism(),
            tiles_total: metadata.total_tiles,
            tiles_success: batch.succeeded,
            elapsed_secs: elapsed,
            tiles_per_sec: if elapsed > 0.0 {
                batch.succeeded as f64 / elapsed
            } else {
                0.0
            },
            grid: metadata,
        };
        info!(
            strategy = report.strategy,
            tiles_success = report.tiles_success,
            tiles_total = report.tiles_total,
            elapsed_secs = format!("{:.1}", report.elapsed_secs).as_str(),
            "mosaic assembled"
        );

        Ok(JobOutput { mosaic, report })
    }
}
