//! Async-semaphore strategy: bounded concurrent I/O on a single thread.
//!
//! A current-thread tokio runtime issues up to `max_in_flight` requests at a
//! time; a counting [`Semaphore`](tokio::sync::Semaphore) gates issuance and
//! new requests start as permits free up. Appropriate when the workload is
//! network-latency-bound rather than CPU-bound.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::info;

use crate::fetch::{AsyncTileFetcher, TileResult};
use crate::grid::TileRequest;
use crate::provider::AsyncHttpClient;

use super::{FetchStrategy, StrategyError};

/// Default cap on concurrently in-flight requests.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 50;

/// Single-threaded cooperative driver with a concurrency permit pool.
pub struct AsyncSemaphoreStrategy<C: AsyncHttpClient + 'static> {
    fetcher: Arc<AsyncTileFetcher<C>>,
    max_in_flight: usize,
}

impl<C: AsyncHttpClient + 'static> AsyncSemaphoreStrategy<C> {
    pub fn new(fetcher: AsyncTileFetcher<C>, max_in_flight: usize) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }
}

impl<C: AsyncHttpClient + 'static> FetchStrategy for AsyncSemaphoreStrategy<C> {
    fn name(&self) -> &'static str {
        "async_semaphore"
    }

    fn run(&self, requests: &[TileRequest]) -> Result<Vec<TileResult>, StrategyError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StrategyError::Runtime(e.to_string()))?;

        info!(
            max_in_flight = self.max_in_flight,
            tiles = requests.len(),
            "fetching with async semaphore"
        );

        runtime.block_on(async {
            let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
            let mut tasks: JoinSet<TileResult> = JoinSet::new();

            for request in requests.iter().copied() {
                let fetcher = Arc::clone(&self.fetcher);
                let semaphore = Arc::clone(&semaphore);
                tasks.spawn(async move {
                    // The semaphore is never closed while tasks run.
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return TileResult::failed(&request);
                    };
                    fetcher.fetch(&request).await
                });
            }

            let mut results = Vec::with_capacity(requests.len());
            while let Some(joined) = tasks.join_next().await {
                results.push(joined.map_err(|e| StrategyError::Worker(e.to_string()))?);
            }
            Ok(results)
        })
    }
}
