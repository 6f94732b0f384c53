//! Data types shared across the ingestion pipeline.

pub mod record;
pub mod task;

pub use record::{FieldValue, ReportRecord, CAPTURE_DATE_COLUMN, SYSTEM_AGENT_COLUMN};
pub use task::{Agent, ScrapeTask, TimeRange};
