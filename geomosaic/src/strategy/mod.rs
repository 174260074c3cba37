//! Concurrency strategies.
//!
//! Four interchangeable drivers share one contract: take the full request
//! list, return one [`TileResult`] per request. Completion order during the
//! run is unspecified; [`finalize`] restores determinism by sorting on
//! `index` and enforcing the job-level success floor. For the same request
//! list and the same set of successes, every strategy hands the assembler
//! an identical batch.

mod partition;
mod pool;
mod semaphore;
mod sequential;

pub use partition::{partition_ranges, PartitionedStrategy};
pub use pool::{WorkerPoolStrategy, DEFAULT_WORKERS};
pub use semaphore::{AsyncSemaphoreStrategy, DEFAULT_MAX_IN_FLIGHT};
pub use sequential::SequentialStrategy;

use thiserror::Error;

use crate::fetch::TileResult;
use crate::grid::TileRequest;

/// Minimum fraction of tiles that must succeed for a mosaic to be produced.
pub const SUCCESS_FLOOR: f64 = 0.5;

/// Failure inside a strategy's machinery (not a tile failure).
#[derive(Debug, Error)]
pub enum StrategyError {
    /// The async runtime could not be created.
    #[error("failed to build async runtime: {0}")]
    Runtime(String),

    /// A worker thread or task panicked or disconnected.
    #[error("worker failed: {0}")]
    Worker(String),

    /// The worker thread pool could not be created.
    #[error("failed to build worker pool: {0}")]
    PoolBuild(String),
}

/// Raised when fewer than half the tiles were fetched successfully.
///
/// A mostly-black mosaic is worse than no mosaic; the job aborts instead.
#[derive(Debug, Clone, Error)]
#[error("too many failed tiles: only {succeeded}/{total} succeeded (need at least 50%)")]
pub struct TooManyFailures {
    pub succeeded: usize,
    pub total: usize,
}

/// A strategy run that passed the success floor: results sorted by index.
#[derive(Debug)]
pub struct FinalizedBatch {
    pub results: Vec<TileResult>,
    pub succeeded: usize,
}

/// One concurrency model for draining the request list.
///
/// Implementations own their fetcher and any scheduling machinery; `run`
/// must produce exactly one result per request, in any order.
pub trait FetchStrategy {
    /// Identifying name carried into the run report.
    fn name(&self) -> &'static str;

    /// Fetches every request, absorbing per-tile failures.
    fn run(&self, requests: &[TileRequest]) -> Result<Vec<TileResult>, StrategyError>;
}

/// Which concurrency strategy to use, selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// One request at a time; the correctness and performance baseline.
    Sequential,
    /// Fixed-width OS-thread pool draining a shared queue.
    WorkerPool,
    /// Single-threaded cooperative scheduler with a concurrency permit pool.
    AsyncSemaphore,
    /// Contiguous index partitions fetched by independent workers, gathered
    /// and concatenated by a coordinator.
    Partitioned,
}

impl StrategyKind {
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::Sequential => "sequential",
            StrategyKind::WorkerPool => "worker_pool",
            StrategyKind::AsyncSemaphore => "async_semaphore",
            StrategyKind::Partitioned => "partitioned",
        }
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(StrategyKind::Sequential),
            "worker_pool" | "pool" => Ok(StrategyKind::WorkerPool),
            "async_semaphore" | "async" => Ok(StrategyKind::AsyncSemaphore),
            "partitioned" | "distributed" => Ok(StrategyKind::Partitioned),
            other => Err(format!("unknown strategy '{}'", other)),
        }
    }
}

/// Common post-processing for every strategy.
///
/// Sorts results by `index` ascending (making the output independent of
/// completion order) and applies the success floor: the batch is rejected
/// when strictly fewer than [`SUCCESS_FLOOR`] of the tiles succeeded.
/// Exactly half proceeds.
pub fn finalize(mut results: Vec<TileResult>) -> Result<FinalizedBatch, TooManyFailures> {
    results.sort_by_key(|r| r.index);
    let total = results.len();
    let succeeded = results.iter().filter(|r| r.success()).count();

    if (succeeded as f64) < SUCCESS_FLOOR * total as f64 {
        return Err(TooManyFailures { succeeded, total });
    }

    Ok(FinalizedBatch { results, succeeded })
}
