//! Geomosaic - Satellite mosaic generation from static-map tiles
//!
//! This library plans a tile grid over a geographic bounding box, fetches the
//! tiles from a static-map provider under one of several concurrency
//! strategies, and composites them into a single georeferenced mosaic.
//!
//! # High-Level API
//!
//! For most use cases, the [`job`] module drives the whole pipeline:
//!
//! ```ignore
//! use geomosaic::fetch::FetchConfig;
//! use geomosaic::job::{JobConfig, MosaicJob};
//! use geomosaic::strategy::StrategyKind;
//!
//! let fetch = FetchConfig::new(api_key);
//! let config = JobConfig::new(50.447, 50.453, 30.520, 30.530, fetch)
//!     .with_strategy(StrategyKind::WorkerPool);
//! let output = MosaicJob::new(config).run()?;
//! output.mosaic.save("mosaic.jpg")?;
//! ```

pub mod coord;
pub mod fetch;
pub mod grid;
pub mod job;
pub mod logging;
pub mod mosaic;
pub mod provider;
pub mod refgrid;
pub mod strategy;
