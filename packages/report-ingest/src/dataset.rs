//! Named datasets over a `DatasetStore`.
//!
//! `Datasets` is the single read and write path for report datasets: it
//! maps report-type names to stored object names, runs the snapshot codec,
//! and classifies what it found.

use serde::Deserialize;

use crate::error::{Result, SnapshotError};
use crate::snapshot;
use crate::traits::{DatasetStore, ObjectId};
use crate::types::ReportRecord;

/// What to do when an existing snapshot cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnreadablePolicy {
    /// Treat it as empty; the next merge overwrites it with the new rows
    #[default]
    Replace,
    /// Refuse to write over it
    Abort,
}

/// Load state of a dataset.
#[derive(Debug)]
pub enum DatasetState {
    /// No object with this name exists
    Missing,
    /// Decoded successfully (possibly with zero rows)
    Present,
    /// The object exists but its content could not be decoded
    Unreadable(SnapshotError),
}

/// A dataset as loaded from the store.
#[derive(Debug)]
pub struct Dataset {
    pub name: String,
    pub id: Option<ObjectId>,
    pub records: Vec<ReportRecord>,
    pub state: DatasetState,
}

impl Dataset {
    pub fn exists(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_unreadable(&self) -> bool {
        matches!(self.state, DatasetState::Unreadable(_))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Store handle owned by the orchestrator and the inspection commands.
pub struct Datasets<S: DatasetStore> {
    store: S,
}

impl<S: DatasetStore> Datasets<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stored object name of a dataset.
    pub fn object_name(name: &str) -> String {
        format!("{}.parquet", name)
    }

    /// Load a dataset.
    ///
    /// Store faults propagate. Decode faults do not: the dataset comes back
    /// empty and marked `Unreadable`.
    pub async fn load(&self, name: &str) -> Result<Dataset> {
        let Some(id) = self.store.find_by_name(&Self::object_name(name)).await? else {
            return Ok(Dataset {
                name: name.to_string(),
                id: None,
                records: Vec::new(),
                state: DatasetState::Missing,
            });
        };

        let bytes = self.store.read(&id).await?;
        let (records, state) = match snapshot::decode(&bytes, name) {
            Ok(records) => (records, DatasetState::Present),
            Err(err) => {
                tracing::warn!(dataset = name, error = %err, "Stored snapshot is unreadable");
                (Vec::new(), DatasetState::Unreadable(err))
            }
        };

        Ok(Dataset {
            name: name.to_string(),
            id: Some(id),
            records,
            state,
        })
    }

    /// Write a full snapshot. Creates the object when `id` is `None`.
    pub async fn save(&self, name: &str, id: Option<&ObjectId>, records: &[ReportRecord]) -> Result<ObjectId> {
        let bytes = snapshot::encode(records)?;
        let size = bytes.len();

        let id = match id {
            Some(id) => {
                self.store.update(id, bytes).await?;
                id.clone()
            }
            None => self.store.create(&Self::object_name(name), bytes).await?,
        };

        tracing::debug!(dataset = name, rows = records.len(), bytes = size, "Saved snapshot");
        Ok(id)
    }
}
