//! Ingestion pipeline: plan → scrape → aggregate → merge, driven day by day
//! from a resolved checkpoint.
//!
//! - [`planner`] - Scrape tasks and query URLs for a day
//! - [`scrape`] - Pagination state machine for one task
//! - [`aggregate`] - Per-day batches keyed by report type
//! - [`merge`] - Append a batch onto its dataset
//! - [`checkpoint`] - Next day to process, from stored capture dates
//! - [`orchestrator`] - The day loop tying it together

pub mod aggregate;
pub mod checkpoint;
pub mod merge;
pub mod orchestrator;
pub mod planner;
pub mod scrape;

pub use aggregate::{DayAggregator, DayBatch};
pub use checkpoint::{Checkpoint, CheckpointPolicy, CheckpointResolver};
pub use merge::{DatasetMerger, MergeOutcome};
pub use orchestrator::{DayReport, Orchestrator, PipelineReport, RunOptions, RunReport};
pub use planner::{encode_conditions, QueryPlanner, TimeSlots};
pub use scrape::{PageLayout, PageScraper, ScrapeOutcome, ScraperSettings, TaskEnd};
