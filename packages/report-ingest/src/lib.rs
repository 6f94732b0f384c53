//! Incremental Report Ingestion
//!
//! Scrapes paginated report tables from a browser-rendered reporting UI, one
//! day at a time, and appends each day's rows to per-report-type columnar
//! datasets held in an object store.
//!
//! Each run resolves a checkpoint from the capture dates already stored,
//! then walks forward to yesterday: plan the day's queries, scrape every
//! task, batch the rows per report type, merge each non-empty batch onto its
//! dataset. Reruns pick up where the last one stopped.
//!
//! # Usage
//!
//! ```rust,ignore
//! use report_ingest::{Datasets, Orchestrator, RunOptions};
//! use report_ingest::testing::{HtmlFixtureBrowser, MemoryStore};
//!
//! let orchestrator = Orchestrator::new(catalog, agents, planner, scraper, datasets, resolver, merger);
//! let report = orchestrator.run(&["missed".to_string()], &RunOptions::new(today)).await?;
//! ```
//!
//! # Modules
//!
//! - [`catalog`] - Report types, their query conditions and record schemas
//! - [`normalizer`] - Raw row values to records
//! - [`pipeline`] - Planner, scraper, aggregator, merger, checkpoint, orchestrator
//! - [`snapshot`] - Parquet encoding of record lists
//! - [`dataset`] - Named datasets over a [`DatasetStore`]
//! - [`stores`] - Store implementations (Drive, local directory, memory)
//! - [`browser`] - Browser drivers (Chrome DevTools, HTML fixtures)
//! - [`inventory`] - Read-only views over stored datasets
//! - [`testing`] - Page builders for tests

pub mod browser;
pub mod catalog;
pub mod config;
pub mod dataset;
pub mod error;
pub mod inventory;
pub mod normalizer;
pub mod pipeline;
pub mod snapshot;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;
pub mod wait;

// Re-export core types at crate root
pub use catalog::{default_catalog, CommaStyle, Pipeline, ReportCatalog, ReportCategory, ReportSpec};
pub use config::{Config, IngestSettings, StoreBackend};
pub use dataset::{Dataset, DatasetState, Datasets, UnreadablePolicy};
pub use error::{DriverError, IngestError, Result, ScrapeError, SnapshotError, StoreError};
pub use pipeline::{
    Checkpoint, CheckpointPolicy, CheckpointResolver, DatasetMerger, Orchestrator, PageLayout,
    PageScraper, QueryPlanner, RunOptions, RunReport, ScraperSettings,
};
pub use traits::{BrowserDriver, DatasetStore, ObjectId};
pub use types::{Agent, FieldValue, ReportRecord, ScrapeTask, TimeRange};
pub use wait::WaitPolicy;
