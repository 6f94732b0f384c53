use std::fmt;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Column carrying the calendar day a record was ingested for.
pub const CAPTURE_DATE_COLUMN: &str = "Ngay_Cào";

/// Column carrying the roster agent a record was scraped under.
pub const SYSTEM_AGENT_COLUMN: &str = "Nhân viên hệ thống";

/// A single typed cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    Text(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Interpret the value as a calendar date.
    ///
    /// Text in `YYYY-MM-DD` form is accepted so that datasets written before
    /// the date column was typed still resolve.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            FieldValue::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str(""),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

/// One row of a report dataset.
///
/// Column order is insertion order and is preserved through snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub report_type: String,
    pub fields: IndexMap<String, FieldValue>,
}

impl ReportRecord {
    pub fn new(report_type: impl Into<String>) -> Self {
        Self {
            report_type: report_type.into(),
            fields: IndexMap::new(),
        }
    }

    /// Set a column, keeping its original position if it already exists.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(column.into(), value.into());
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields.get(column)
    }

    /// Text content of a column, empty when absent or non-text.
    pub fn text(&self, column: &str) -> &str {
        self.get(column).and_then(FieldValue::as_text).unwrap_or("")
    }

    pub fn capture_date(&self) -> Option<NaiveDate> {
        self.get(CAPTURE_DATE_COLUMN).and_then(FieldValue::as_date)
    }

    pub fn system_agent(&self) -> &str {
        self.text(SYSTEM_AGENT_COLUMN)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_preserves_column_position() {
        let mut record = ReportRecord::new("Miss_Call")
            .with("SDT", "0901")
            .with("Trạng thái", "missed");
        record.set("SDT", "0902");

        let columns: Vec<_> = record.columns().collect();
        assert_eq!(columns, vec!["SDT", "Trạng thái"]);
        assert_eq!(record.text("SDT"), "0902");
    }

    #[test]
    fn test_capture_date_accepts_legacy_text() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();

        let typed = ReportRecord::new("x").with(CAPTURE_DATE_COLUMN, date);
        let legacy = ReportRecord::new("x").with(CAPTURE_DATE_COLUMN, "2026-01-02");
        let garbage = ReportRecord::new("x").with(CAPTURE_DATE_COLUMN, "yesterday");

        assert_eq!(typed.capture_date(), Some(date));
        assert_eq!(legacy.capture_date(), Some(date));
        assert_eq!(garbage.capture_date(), None);
    }

    #[test]
    fn test_text_of_missing_column_is_empty() {
        let record = ReportRecord::new("x");
        assert_eq!(record.text("Tags"), "");
        assert_eq!(record.system_agent(), "");
    }
}
