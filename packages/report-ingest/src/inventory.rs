//! Read-only views over accumulated datasets.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::catalog::ReportCatalog;
use crate::dataset::{DatasetState, Datasets};
use crate::error::Result;
use crate::normalizer::is_zero_duration;
use crate::traits::DatasetStore;
use crate::types::ReportRecord;

/// Row counts per (capture date, system agent), one column per report type.
#[derive(Debug, Default)]
pub struct Inventory {
    pub report_types: Vec<String>,
    pub rows: Vec<InventoryRow>,
    /// Datasets that exist but could not be decoded
    pub unreadable: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRow {
    /// `None` for rows without a parseable capture date
    pub date: Option<NaiveDate>,
    pub agent: String,
    /// Aligned with `Inventory::report_types`, zero-filled
    pub counts: Vec<usize>,
}

impl InventoryRow {
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Build the inventory pivot for the selected pipelines.
///
/// Rows are ordered newest day first, then by agent name.
pub async fn inventory<S: DatasetStore>(
    datasets: &Datasets<S>,
    catalog: &ReportCatalog,
    pipelines: &[String],
) -> Result<Inventory> {
    let mut report_types = Vec::new();
    for pipeline in catalog.select(pipelines)? {
        report_types.extend(pipeline.report_types.iter().cloned());
    }

    let mut cells: BTreeMap<(Reverse<Option<NaiveDate>>, String), Vec<usize>> = BTreeMap::new();
    let mut unreadable = Vec::new();

    for (column, name) in report_types.iter().enumerate() {
        let dataset = datasets.load(name).await?;
        if dataset.is_unreadable() {
            unreadable.push(name.clone());
            continue;
        }

        for record in &dataset.records {
            let key = (Reverse(record.capture_date()), record.system_agent().to_string());
            let counts = cells.entry(key).or_insert_with(|| vec![0; report_types.len()]);
            counts[column] += 1;
        }
    }

    let rows = cells
        .into_iter()
        .map(|((Reverse(date), agent), counts)| InventoryRow { date, agent, counts })
        .collect();

    Ok(Inventory {
        report_types,
        rows,
        unreadable,
    })
}

/// One dataset as seen for one day.
#[derive(Debug)]
pub struct DatasetInspection {
    pub name: String,
    pub exists: bool,
    pub unreadable: bool,
    pub total_rows: usize,
    pub rows_for_day: usize,
    /// First rows of the day, in stored order
    pub sample: Vec<ReportRecord>,
    /// Zero-length calls on the day, for datasets with a duration column
    pub zero_duration: Option<usize>,
}

/// Inspect every dataset of the selected pipelines for `day`.
pub async fn inspect<S: DatasetStore>(
    datasets: &Datasets<S>,
    catalog: &ReportCatalog,
    pipelines: &[String],
    day: NaiveDate,
    limit: usize,
) -> Result<Vec<DatasetInspection>> {
    let mut inspections = Vec::new();

    for pipeline in catalog.select(pipelines)? {
        for spec in catalog.pipeline_specs(pipeline)? {
            let dataset = datasets.load(&spec.name).await?;
            let on_day: Vec<&ReportRecord> = dataset
                .records
                .iter()
                .filter(|r| r.capture_date() == Some(day))
                .collect();

            let zero_duration = spec
                .schema()
                .duration_column()
                .map(|column| on_day.iter().filter(|r| is_zero_duration(r.text(column))).count());

            inspections.push(DatasetInspection {
                name: spec.name.clone(),
                exists: dataset.exists(),
                unreadable: matches!(dataset.state, DatasetState::Unreadable(_)),
                total_rows: dataset.len(),
                rows_for_day: on_day.len(),
                sample: on_day.iter().take(limit).map(|r| (*r).clone()).collect(),
                zero_duration,
            });
        }
    }

    Ok(inspections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_catalog;
    use crate::stores::MemoryStore;
    use crate::types::{CAPTURE_DATE_COLUMN, SYSTEM_AGENT_COLUMN};
    use bytes::Bytes;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn call(report_type: &str, agent: &str, d: u32, duration: &str) -> ReportRecord {
        ReportRecord::new(report_type)
            .with("SDT", "0901")
            .with("Thời lượng", duration)
            .with(SYSTEM_AGENT_COLUMN, agent)
            .with(CAPTURE_DATE_COLUMN, day(d))
    }

    #[tokio::test]
    async fn test_inventory_pivots_newest_first() {
        let datasets = Datasets::new(MemoryStore::new());
        datasets
            .save(
                "Call_Den_Trong_Gio",
                None,
                &[
                    call("Call_Den_Trong_Gio", "B", 1, "1 phút"),
                    call("Call_Den_Trong_Gio", "A", 2, "1 phút"),
                    call("Call_Den_Trong_Gio", "A", 2, "2 phút"),
                ],
            )
            .await
            .unwrap();
        datasets
            .save("Call_Di_Ngoai_Gio", None, &[call("Call_Di_Ngoai_Gio", "B", 2, "1 phút")])
            .await
            .unwrap();
        datasets.store().insert_raw("Call_Di_Trong_Gio.parquet", Bytes::from_static(b"bad"));

        let inventory = inventory(&datasets, &default_catalog(), &["calls".to_string()])
            .await
            .unwrap();

        assert_eq!(inventory.report_types.len(), 4);
        assert_eq!(inventory.unreadable, vec!["Call_Di_Trong_Gio"]);

        let keys: Vec<_> = inventory
            .rows
            .iter()
            .map(|r| (r.date, r.agent.as_str(), r.total()))
            .collect();
        assert_eq!(
            keys,
            vec![(Some(day(2)), "A", 2), (Some(day(2)), "B", 1), (Some(day(1)), "B", 1)]
        );

        let den = inventory.report_types.iter().position(|t| t == "Call_Den_Trong_Gio").unwrap();
        assert_eq!(inventory.rows[0].counts[den], 2);
    }

    #[tokio::test]
    async fn test_inspect_reports_day_rows_and_zero_durations() {
        let datasets = Datasets::new(MemoryStore::new());
        datasets
            .save(
                "Call_Den_Trong_Gio",
                None,
                &[
                    call("Call_Den_Trong_Gio", "A", 1, "0 phút"),
                    call("Call_Den_Trong_Gio", "A", 2, "0 phút"),
                    call("Call_Den_Trong_Gio", "A", 2, "0 phút 30 giây"),
                    call("Call_Den_Trong_Gio", "A", 2, "3 phút"),
                ],
            )
            .await
            .unwrap();

        let result = inspect(&datasets, &default_catalog(), &["calls".to_string()], day(2), 2)
            .await
            .unwrap();

        let den = result.iter().find(|i| i.name == "Call_Den_Trong_Gio").unwrap();
        assert!(den.exists);
        assert_eq!(den.total_rows, 4);
        assert_eq!(den.rows_for_day, 3);
        assert_eq!(den.sample.len(), 2);
        assert_eq!(den.zero_duration, Some(1));

        let missing = result.iter().find(|i| i.name == "Call_Di_Trong_Gio").unwrap();
        assert!(!missing.exists);
        assert_eq!(missing.rows_for_day, 0);
    }
}
