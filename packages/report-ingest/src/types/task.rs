use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A roster agent whose activity is scraped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    pub id: String,
}

impl Agent {
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// Inclusive range of remote time-slot identifiers covering one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    /// Render as the `"[start,end]"` string the query contract expects.
    pub fn to_query_value(&self) -> String {
        format!("[{},{}]", self.start, self.end)
    }
}

/// One unit of pagination work: a single query for one day.
#[derive(Debug, Clone)]
pub struct ScrapeTask {
    pub capture_date: NaiveDate,
    /// None for report types that are not filtered by agent
    pub agent: Option<Agent>,
    pub report_type: String,
    pub time_range: TimeRange,
    /// Percent-encoded condition array (the `conditions=` query value)
    pub conditions: String,
    pub url: String,
}

impl ScrapeTask {
    pub fn agent_name(&self) -> Option<&str> {
        self.agent.as_ref().map(|a| a.name.as_str())
    }
}
