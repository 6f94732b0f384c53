//! Typed errors for the ingestion library.
//!
//! Faults are split by where they are contained: `DriverError` and
//! `ScrapeError` never leave a scrape task, `SnapshotError` is absorbed when a
//! dataset is loaded, and `StoreError` aborts the run.

use std::time::Duration;

use thiserror::Error;

/// Errors that abort an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Dataset store unreachable or rejected the request
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Snapshot could not be encoded for write-back
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Existing dataset could not be decoded and the policy forbids replacing it
    #[error("refusing to overwrite unreadable dataset {name}: {reason}")]
    UnreadableDataset { name: String, reason: String },

    /// Report type name not present in the catalog
    #[error("unknown report type: {0}")]
    UnknownReportType(String),

    /// Pipeline name not present in the catalog
    #[error("unknown pipeline: {0}")]
    UnknownPipeline(String),

    /// Browser session could not be established
    #[error("browser error: {0}")]
    Browser(#[from] DriverError),
}

/// Errors raised by a `DatasetStore` adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Remote store request failed (connectivity, auth, API rejection)
    #[error("remote store request failed: {0}")]
    Remote(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Object identity does not resolve to a stored object
    #[error("object not found: {id}")]
    NotFound { id: String },

    /// Object name is not usable by the store
    #[error("invalid object name: {name:?}")]
    InvalidName { name: String },

    /// An object with this name already exists
    #[error("object already exists: {name}")]
    AlreadyExists { name: String },

    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<drive_client::DriveError> for StoreError {
    fn from(err: drive_client::DriveError) -> Self {
        StoreError::Remote(Box::new(err))
    }
}

/// Errors raised by a `BrowserDriver` adapter.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Page navigation failed
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// Element lookup failed (bad selector, detached node, protocol error)
    #[error("query {selector:?} failed: {reason}")]
    Query { selector: String, reason: String },

    /// Element handle refers to a page that is no longer rendered
    #[error("stale element handle")]
    StaleElement,

    /// Interaction with an element failed
    #[error("interaction failed: {0}")]
    Interaction(String),

    /// Browser session could not be reached
    #[error("browser session unavailable: {0}")]
    Session(String),
}

/// Task-level faults. Contained by the scraper and reported on the task outcome.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Page did not reach the expected state within the wait budget
    #[error("render timeout waiting for {what} after {waited:?}")]
    RenderTimeout { what: &'static str, waited: Duration },

    /// Task exceeded its wall-clock budget
    #[error("task deadline of {limit:?} exceeded")]
    Deadline { limit: Duration },

    /// Task hit its page ceiling
    #[error("page limit of {limit} reached")]
    PageLimit { limit: usize },

    /// Navigation or container access failed
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
}

/// Errors raised while encoding or decoding a Parquet snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Column type with no record value mapping
    #[error("unsupported column {name} of type {data_type}")]
    UnsupportedColumn { name: String, data_type: String },
}

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for driver operations.
pub type DriverResult<T> = std::result::Result<T, DriverError>;
