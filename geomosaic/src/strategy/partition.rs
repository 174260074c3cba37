//! Distributed partition/gather strategy.
//!
//! The request list is statically partitioned into contiguous, near-equal
//! index ranges, one per worker: `floor(total / workers)` each, with the
//! first `total mod workers` workers taking one extra. Each worker fetches
//! its share independently and serializes its results; a single coordinator
//! gathers every partition over a channel and concatenates them.
//!
//! Serialization uses PNG so the transfer is lossless: the gathered batch is
//! pixel-identical to what any other strategy hands the assembler. With one
//! worker (or none) the strategy degenerates to a plain sequential pass.

use std::io::Cursor;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::mpsc;

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::fetch::{TilePayload, TileResult, TileSource};
use crate::grid::TileRequest;

use super::{FetchStrategy, StrategyError};

/// Splits `0..total` into `workers` contiguous near-equal ranges.
///
/// Ranges are emitted in index order; sizes differ by at most one, with the
/// remainder going to the first workers. Empty ranges are possible when
/// `workers > total`.
pub fn partition_ranges(total: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let base = total / workers;
    let remainder = total % workers;

    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0;
    for i in 0..workers {
        let len = base + usize::from(i < remainder);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

/// A tile result in wire form, as serialized by a partition worker.
struct WireTile {
    row: u32,
    col: u32,
    index: usize,
    payload: Option<WirePayload>,
}

enum WirePayload {
    /// PNG-encoded pixels (in-memory fetch mode).
    Png(Vec<u8>),
    /// Path of a spooled tile file (disk-backed fetch mode).
    Spooled(PathBuf),
}

fn serialize(result: TileResult) -> WireTile {
    let payload = match result.payload {
        None => None,
        Some(TilePayload::OnDisk(path)) => Some(WirePayload::Spooled(path)),
        Some(TilePayload::Decoded(image)) => {
            let mut bytes = Vec::new();
            match image.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png) {
                Ok(()) => Some(WirePayload::Png(bytes)),
                Err(e) => {
                    warn!(index = result.index, error = %e, "failed to serialize tile");
                    None
                }
            }
        }
    };
    WireTile {
        row: result.row,
        col: result.col,
        index: result.index,
        payload,
    }
}

fn deserialize(tile: WireTile) -> TileResult {
    let payload = match tile.payload {
        None => None,
        Some(WirePayload::Spooled(path)) => Some(TilePayload::OnDisk(path)),
        Some(WirePayload::Png(bytes)) => match image::load_from_memory(&bytes) {
            Ok(decoded) => Some(TilePayload::Decoded(decoded.to_rgb8())),
            Err(e) => {
                warn!(index = tile.index, error = %e, "failed to deserialize tile");
                None
            }
        },
    };
    TileResult {
        row: tile.row,
        col: tile.col,
        index: tile.index,
        payload,
    }
}

/// Scatter/gather driver over independent OS-thread workers.
pub struct PartitionedStrategy<S: TileSource> {
    source: S,
    workers: usize,
}

impl<S: TileSource> PartitionedStrategy<S> {
    pub fn new(source: S, workers: usize) -> Self {
        Self {
            source,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl<S: TileSource> FetchStrategy for PartitionedStrategy<S> {
    fn name(&self) -> &'static str {
        "partitioned"
    }

    fn run(&self, requests: &[TileRequest]) -> Result<Vec<TileResult>, StrategyError> {
        if self.workers <= 1 {
            // Single participant: the scatter/gather machinery buys nothing.
            debug!("single worker, falling back to sequential pass");
            return Ok(requests.iter().map(|r| self.source.fetch_tile(r)).collect());
        }

        let ranges = partition_ranges(requests.len(), self.workers);
        info!(
            workers = self.workers,
            tiles = requests.len(),
            "fetching with partitioned workers"
        );

        let (sender, receiver) = mpsc::channel::<(usize, Vec<WireTile>)>();

        let mut gathered: Vec<(usize, Vec<WireTile>)> = std::thread::scope(|scope| {
            for (worker_id, range) in ranges.iter().cloned().enumerate() {
                let sender = sender.clone();
                let share = &requests[range];
                let source = &self.source;
                scope.spawn(move || {
                    let tiles: Vec<WireTile> = share
                        .iter()
                        .map(|request| serialize(source.fetch_tile(request)))
                        .collect();
                    debug!(worker_id, tiles = tiles.len(), "partition complete");
                    // Receiver outlives the scope; a send failure means the
                    // coordinator is gone and the result is moot.
                    let _ = sender.send((worker_id, tiles));
                });
            }
            drop(sender);
            receiver.iter().collect()
        });

        if gathered.len() != ranges.len() {
            return Err(StrategyError::Worker(format!(
                "gathered {} of {} partitions",
                gathered.len(),
                ranges.len()
            )));
        }

        // Concatenate partitions in worker order; finalize re-sorts by index.
        gathered.sort_by_key(|(worker_id, _)| *worker_id);
        Ok(gathered
            .into_iter()
            .flat_map(|(_, tiles)| tiles)
            .map(deserialize)
            .collect())
    }
}
