//! Day-level collection of scraped records.
//!
//! Nothing is merged until every task of the day has run; the aggregator is
//! the barrier between scraping and writing.

use chrono::NaiveDate;
use indexmap::IndexMap;

use crate::types::{FieldValue, ReportRecord, CAPTURE_DATE_COLUMN};

pub struct DayAggregator {
    day: NaiveDate,
    batches: IndexMap<String, Vec<ReportRecord>>,
}

impl DayAggregator {
    /// Start a day. Report types are pre-registered so batches come out in
    /// pipeline order whatever order tasks finish in.
    pub fn new(day: NaiveDate, report_types: &[String]) -> Self {
        Self {
            day,
            batches: report_types.iter().map(|t| (t.clone(), Vec::new())).collect(),
        }
    }

    /// Tag records with the day and append them to their report type's batch.
    pub fn add(&mut self, report_type: &str, records: Vec<ReportRecord>) {
        let day = self.day;
        let batch = self.batches.entry(report_type.to_string()).or_default();
        batch.extend(records.into_iter().map(|mut record| {
            record.set(CAPTURE_DATE_COLUMN, FieldValue::Date(day));
            record
        }));
    }

    pub fn finish(self) -> DayBatch {
        DayBatch {
            day: self.day,
            batches: self.batches,
        }
    }
}

/// All records of one day, grouped by report type.
#[derive(Debug)]
pub struct DayBatch {
    pub day: NaiveDate,
    batches: IndexMap<String, Vec<ReportRecord>>,
}

impl DayBatch {
    pub fn get(&self, report_type: &str) -> &[ReportRecord] {
        self.batches.get(report_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Report types with at least one record, in pipeline order.
    pub fn non_empty(&self) -> impl Iterator<Item = (&str, &[ReportRecord])> {
        self.batches
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(name, records)| (name.as_str(), records.as_slice()))
    }

    pub fn total_rows(&self) -> usize {
        self.batches.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 9).unwrap()
    }

    #[test]
    fn test_batches_concatenate_across_agents_and_tag_day() {
        let types = vec!["Call_Den_Trong_Gio".to_string(), "Call_Di_Trong_Gio".to_string()];
        let mut aggregator = DayAggregator::new(day(), &types);

        aggregator.add(
            "Call_Di_Trong_Gio",
            vec![ReportRecord::new("Call_Di_Trong_Gio").with("SDT", "1")],
        );
        aggregator.add(
            "Call_Di_Trong_Gio",
            vec![
                ReportRecord::new("Call_Di_Trong_Gio").with("SDT", "1"),
                ReportRecord::new("Call_Di_Trong_Gio").with("SDT", "2"),
            ],
        );

        let batch = aggregator.finish();
        let calls = batch.get("Call_Di_Trong_Gio");
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|r| r.capture_date() == Some(day())));
        assert_eq!(calls[2].columns().last(), Some(CAPTURE_DATE_COLUMN));

        let non_empty: Vec<_> = batch.non_empty().map(|(name, _)| name).collect();
        assert_eq!(non_empty, vec!["Call_Di_Trong_Gio"]);
        assert_eq!(batch.total_rows(), 3);
    }
}
