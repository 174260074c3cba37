//! Bounded worker-pool strategy.
//!
//! A fixed-size rayon thread pool drains the request list; completion order
//! is arbitrary and is normalized later by `finalize`.

use rayon::prelude::*;
use tracing::info;

use crate::fetch::{TileResult, TileSource};
use crate::grid::TileRequest;

use super::{FetchStrategy, StrategyError};

/// Default worker count for the pool strategy.
pub const DEFAULT_WORKERS: usize = 30;

/// Fetches tiles on a dedicated thread pool of fixed width.
pub struct WorkerPoolStrategy<S: TileSource> {
    source: S,
    pool: rayon::ThreadPool,
    workers: usize,
}

impl<S: TileSource> WorkerPoolStrategy<S> {
    /// Creates the strategy with its own pool of `workers` threads.
    pub fn new(source: S, workers: usize) -> Result<Self, StrategyError> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tile-worker-{}", i))
            .build()
            .map_err(|e| StrategyError::PoolBuild(e.to_string()))?;
        Ok(Self {
            source,
            pool,
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl<S: TileSource> FetchStrategy for WorkerPoolStrategy<S> {
    fn name(&self) -> &'static str {
        "worker_pool"
    }

    fn run(&self, requests: &[TileRequest]) -> Result<Vec<TileResult>, StrategyError> {
        info!(
            workers = self.workers,
            tiles = requests.len(),
            "fetching with worker pool"
        );
        let results = self.pool.install(|| {
            requests
                .par_iter()
                .map(|request| self.source.fetch_tile(request))
                .collect()
        });
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::tests::{requests, ScriptedSource};
    use std::collections::HashSet;

    #[test]
    fn test_complete_result_set_regardless_of_order() {
        let strategy = WorkerPoolStrategy::new(ScriptedSource::all_ok(4), 4).unwrap();
        let results = strategy.run(&requests(25)).unwrap();

        assert_eq!(results.len(), 25);
        let indices: HashSet<usize> = results.iter().map(|r| r.index).collect();
        assert_eq!(indices.len(), 25, "every index appears exactly once");
        assert_eq!(strategy.source.calls(), 25);
    }

    #[test]
    fn test_failures_are_recorded_not_dropped() {
        let strategy =
            WorkerPoolStrategy::new(ScriptedSource::failing([1, 2, 3], 4), 3).unwrap();
        let results = strategy.run(&requests(10)).unwrap();

        assert_eq!(results.len(), 10);
        assert_eq!(results.iter().filter(|r| !r.success()).count(), 3);
    }

    #[test]
    fn test_single_worker_pool_still_completes() {
        let strategy = WorkerPoolStrategy::new(ScriptedSource::all_ok(4), 1).unwrap();
        assert_eq!(strategy.run(&requests(8)).unwrap().len(), 8);
    }

    #[test]
    fn test_zero_workers_clamped_to_one() {
        let strategy = WorkerPoolStrategy::new(ScriptedSource::all_ok(4), 0).unwrap();
        assert_eq!(strategy.workers(), 1);
    }
}
