//! Read-existing → append-new → write-back.

use crate::dataset::{DatasetState, Datasets, UnreadablePolicy};
use crate::error::{IngestError, Result};
use crate::traits::DatasetStore;
use crate::types::ReportRecord;

/// Result of one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub previous_rows: usize,
    pub appended: usize,
    pub total_rows: usize,
    /// The dataset did not exist and was created
    pub created: bool,
    /// Anything was written at all
    pub written: bool,
}

/// Appends day batches to datasets.
///
/// There is no concurrency control: a writer racing this one between the
/// read and the write-back loses its rows.
pub struct DatasetMerger {
    unreadable: UnreadablePolicy,
}

impl DatasetMerger {
    pub fn new(unreadable: UnreadablePolicy) -> Self {
        Self { unreadable }
    }

    pub async fn merge_append<S: DatasetStore>(
        &self,
        datasets: &Datasets<S>,
        report_type: &str,
        new_records: &[ReportRecord],
    ) -> Result<MergeOutcome> {
        if new_records.is_empty() {
            return Ok(MergeOutcome::default());
        }

        let existing = datasets.load(report_type).await?;
        if let DatasetState::Unreadable(err) = &existing.state {
            match self.unreadable {
                UnreadablePolicy::Abort => {
                    return Err(IngestError::UnreadableDataset {
                        name: report_type.to_string(),
                        reason: err.to_string(),
                    });
                }
                UnreadablePolicy::Replace => tracing::warn!(
                    report_type,
                    error = %err,
                    "Replacing unreadable dataset with new rows only"
                ),
            }
        }

        let previous_rows = existing.len();
        let created = !existing.exists();
        let mut combined = existing.records;
        combined.extend_from_slice(new_records);

        datasets.save(report_type, existing.id.as_ref(), &combined).await?;

        let outcome = MergeOutcome {
            previous_rows,
            appended: new_records.len(),
            total_rows: combined.len(),
            created,
            written: true,
        };

        tracing::info!(
            report_type,
            previous = outcome.previous_rows,
            appended = outcome.appended,
            total = outcome.total_rows,
            created = outcome.created,
            "Merged day batch"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::types::CAPTURE_DATE_COLUMN;
    use bytes::Bytes;
    use chrono::NaiveDate;

    fn batch(phones: &[&str], d: u32) -> Vec<ReportRecord> {
        let day = NaiveDate::from_ymd_opt(2026, 1, d).unwrap();
        phones
            .iter()
            .map(|p| {
                ReportRecord::new("Miss_Call")
                    .with("SDT", *p)
                    .with(CAPTURE_DATE_COLUMN, day)
            })
            .collect()
    }

    fn phones(records: &[ReportRecord]) -> Vec<String> {
        records.iter().map(|r| r.text("SDT").to_string()).collect()
    }

    #[tokio::test]
    async fn test_merge_creates_then_appends_in_order() {
        let datasets = Datasets::new(MemoryStore::new());
        let merger = DatasetMerger::new(UnreadablePolicy::Replace);

        let first = merger.merge_append(&datasets, "Miss_Call", &batch(&["1", "2"], 1)).await.unwrap();
        assert!(first.created);
        assert_eq!(first.total_rows, 2);

        let second = merger.merge_append(&datasets, "Miss_Call", &batch(&["3"], 2)).await.unwrap();
        assert!(!second.created);
        assert_eq!((second.previous_rows, second.appended, second.total_rows), (2, 1, 3));

        let stored = datasets.load("Miss_Call").await.unwrap();
        assert_eq!(phones(&stored.records), vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_sequential_merges_equal_one_concatenated_merge() {
        let merger = DatasetMerger::new(UnreadablePolicy::Replace);
        let a = batch(&["1", "2"], 1);
        let b = batch(&["2", "3"], 2);

        let split = Datasets::new(MemoryStore::new());
        merger.merge_append(&split, "Miss_Call", &a).await.unwrap();
        merger.merge_append(&split, "Miss_Call", &b).await.unwrap();

        let joined = Datasets::new(MemoryStore::new());
        let ab: Vec<_> = a.iter().chain(b.iter()).cloned().collect();
        merger.merge_append(&joined, "Miss_Call", &ab).await.unwrap();

        let split = split.load("Miss_Call").await.unwrap().records;
        let joined = joined.load("Miss_Call").await.unwrap().records;
        assert_eq!(split, joined);
        assert_eq!(split.len(), 4);
    }

    #[tokio::test]
    async fn test_empty_merge_writes_nothing() {
        let datasets = Datasets::new(MemoryStore::new());
        let merger = DatasetMerger::new(UnreadablePolicy::Replace);
        merger.merge_append(&datasets, "Miss_Call", &batch(&["1"], 1)).await.unwrap();
        let writes = datasets.store().write_count();

        let outcome = merger.merge_append(&datasets, "Miss_Call", &[]).await.unwrap();
        assert!(!outcome.written);
        assert_eq!(datasets.store().write_count(), writes);

        let missing = merger.merge_append(&datasets, "Miss_Zalo", &[]).await.unwrap();
        assert!(!missing.written);
        assert!(!datasets.store().contains("Miss_Zalo.parquet"));
    }

    #[tokio::test]
    async fn test_unreadable_dataset_policies() {
        let store = MemoryStore::new();
        store.insert_raw("Miss_Call.parquet", Bytes::from_static(b"corrupt"));
        let datasets = Datasets::new(store);

        let abort = DatasetMerger::new(UnreadablePolicy::Abort);
        let result = abort.merge_append(&datasets, "Miss_Call", &batch(&["1"], 1)).await;
        assert!(matches!(result, Err(IngestError::UnreadableDataset { .. })));
        assert_eq!(datasets.store().write_count(), 0);

        let replace = DatasetMerger::new(UnreadablePolicy::Replace);
        let outcome = replace
            .merge_append(&datasets, "Miss_Call", &batch(&["1"], 1))
            .await
            .unwrap();
        assert_eq!((outcome.previous_rows, outcome.total_rows, outcome.created), (0, 1, false));
        assert_eq!(datasets.load("Miss_Call").await.unwrap().len(), 1);
    }
}
