//! Raw row → typed record.
//!
//! Every column is read independently; a location that could not be read
//! falls back to the schema default. The only reason to reject a row is a
//! blank identity column (customer name or phone number), which is how
//! header, spacer and placeholder rows present themselves.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::{FieldRole, FieldSource, RecordSchema, ReportCategory, ReportSpec, Source};
use crate::types::{Agent, FieldValue, ReportRecord};

/// Value written to `system_agent` for reports not scraped under an agent.
pub const UNASSIGNED_AGENT: &str = "N/A";

static RE_SECONDS_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\s*giây$").unwrap());
static RE_MINUTES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*phút").unwrap());
static RE_SECONDS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*giây").unwrap());

/// Values read from one rendered row, keyed by where they were read.
///
/// A location that failed to read is simply absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    values: HashMap<Source, String>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: Source, value: impl Into<String>) {
        self.values.insert(source, value.into());
    }

    pub fn with(mut self, source: Source, value: impl Into<String>) -> Self {
        self.insert(source, value);
        self
    }

    pub fn get(&self, source: Source) -> Option<&str> {
        self.values.get(&source).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Map a raw row onto the report's schema.
///
/// Returns `None` only when the identity column is blank.
pub fn normalize(raw: &RawRow, spec: &ReportSpec, agent: Option<&Agent>) -> Option<ReportRecord> {
    let schema = spec.schema();
    let mut record = ReportRecord::new(&spec.name);

    for field in schema.fields {
        let read = match field.source {
            FieldSource::SystemAgent => Some(
                agent
                    .map(|a| a.name.as_str())
                    .unwrap_or(UNASSIGNED_AGENT),
            ),
            FieldSource::ReportLabel => Some(spec.name.as_str()),
            FieldSource::Row(source) => raw.get(source),
            FieldSource::RowOr(primary, fallback) => raw.get(primary).or_else(|| raw.get(fallback)),
        };

        let value = match field.role {
            FieldRole::Identity => {
                let value = read.map(str::trim).unwrap_or("");
                if value.is_empty() {
                    return None;
                }
                value.to_string()
            }
            FieldRole::Duration => canonical_duration(read.map(str::trim).unwrap_or(field.default)),
            FieldRole::Plain => read.map(str::trim).unwrap_or(field.default).to_string(),
        };

        record.set(field.column, FieldValue::Text(value));
    }

    Some(record)
}

/// Rewrite a seconds-only duration (`"50 giây"`) as `"0 phút 50 giây"`.
///
/// Any other text is returned unchanged.
pub fn canonical_duration(text: &str) -> String {
    if RE_SECONDS_ONLY.is_match(text) {
        format!("0 phút {}", text)
    } else {
        text.to_string()
    }
}

/// Total seconds of a `"N phút M giây"` duration. Missing parts count as zero.
pub fn duration_seconds(text: &str) -> u64 {
    let capture = |re: &Regex| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };

    capture(&RE_MINUTES) * 60 + capture(&RE_SECONDS)
}

/// A duration with no non-zero digit: `"0 phút"`, `"0 phút 0 giây"`, `""`.
pub fn is_zero_duration(text: &str) -> bool {
    !text.chars().any(|c| c.is_ascii_digit() && c != '0')
}

/// Post-normalization retention rule.
///
/// Call-interaction reports keep only calls that lasted. Everything else is
/// retained.
pub fn retain(record: &ReportRecord, category: ReportCategory) -> bool {
    if !category.drops_zero_duration() {
        return true;
    }

    match category.schema().duration_column() {
        Some(column) => !is_zero_duration(record.text(column)),
        None => true,
    }
}

/// Identity of a row within one task's result set.
pub fn natural_key(record: &ReportRecord, schema: &RecordSchema) -> Vec<String> {
    schema
        .key_columns
        .iter()
        .map(|column| record.get(column).map(ToString::to_string).unwrap_or_default())
        .collect()
}
