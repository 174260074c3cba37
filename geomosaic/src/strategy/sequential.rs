//! Sequential strategy: one request at a time, in index order.

use tracing::debug;

use crate::fetch::{TileResult, TileSource};
use crate::grid::TileRequest;

use super::{FetchStrategy, StrategyError};

/// Fetches every tile on the calling thread, in request order.
///
/// The simplest driver; used as the correctness and performance baseline,
/// and as the fallback when a parallel strategy has only one worker.
pub struct SequentialStrategy<S: TileSource> {
    source: S,
}

impl<S: TileSource> SequentialStrategy<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: TileSource> FetchStrategy for SequentialStrategy<S> {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn run(&self, requests: &[TileRequest]) -> Result<Vec<TileResult>, StrategyError> {
        let mut results = Vec::with_capacity(requests.len());
        for (done, request) in requests.iter().enumerate() {
            results.push(self.source.fetch_tile(request));
            if (done + 1) % 10 == 0 || done + 1 == requests.len() {
                debug!(done = done + 1, total = requests.len(), "sequential progress");
            }
        }
        Ok(results)
    }
}
