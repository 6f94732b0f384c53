//! Day × agent × report type → scrape tasks.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::catalog::{CommaStyle, Condition, ReportSpec};
use crate::types::{Agent, ScrapeTask, TimeRange};

/// Mapping from calendar days to the reporting UI's hourly slot ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimeSlots {
    /// Day whose first slot is `base_id`
    pub epoch: NaiveDate,
    pub base_id: i64,
    pub slots_per_day: i64,
}

impl Default for TimeSlots {
    fn default() -> Self {
        Self {
            epoch: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or_default(),
            base_id: 490_889,
            slots_per_day: 24,
        }
    }
}

impl TimeSlots {
    /// Inclusive slot range covering `day`.
    pub fn range_for(&self, day: NaiveDate) -> TimeRange {
        let offset = (day - self.epoch).num_days();
        let start = self.base_id + offset * self.slots_per_day;
        TimeRange {
            start,
            end: start + self.slots_per_day - 1,
        }
    }
}

/// Renders report queries into task URLs.
#[derive(Debug, Clone)]
pub struct QueryPlanner {
    base_url: String,
    slots: TimeSlots,
}

impl QueryPlanner {
    pub fn new(base_url: impl Into<String>, slots: TimeSlots) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            slots,
        }
    }

    pub fn slots(&self) -> &TimeSlots {
        &self.slots
    }

    /// Every task for one day.
    ///
    /// Per-agent report types come first, agent-major in roster order; report
    /// types not filtered by agent follow, once each.
    pub fn plan(&self, day: NaiveDate, agents: &[Agent], specs: &[&ReportSpec]) -> Vec<ScrapeTask> {
        let range = self.slots.range_for(day);
        let (per_agent, unassigned): (Vec<&ReportSpec>, Vec<&ReportSpec>) =
            specs.iter().copied().partition(|s| s.per_agent());

        let mut tasks = Vec::with_capacity(agents.len() * per_agent.len() + unassigned.len());
        for agent in agents {
            for spec in &per_agent {
                tasks.push(self.task(day, range, Some(agent), spec));
            }
        }
        for spec in &unassigned {
            tasks.push(self.task(day, range, None, spec));
        }
        tasks
    }

    fn task(&self, day: NaiveDate, range: TimeRange, agent: Option<&Agent>, spec: &ReportSpec) -> ScrapeTask {
        let conditions = encode_conditions(&spec.bind(range, agent), spec.commas);
        let url = format!(
            "{}/new-reports/{}?conditions={}",
            self.base_url,
            spec.list.path(),
            conditions
        );

        ScrapeTask {
            capture_date: day,
            agent: agent.cloned(),
            report_type: spec.name.clone(),
            time_range: range,
            conditions,
            url,
        }
    }
}

/// Percent-encode the JSON condition array.
///
/// Commas inside string values stay literal; commas between members follow
/// `commas`.
pub fn encode_conditions(conditions: &[Condition], commas: CommaStyle) -> String {
    let json = serde_json::to_string(conditions).unwrap_or_else(|_| "[]".to_string());

    let mut encoded = String::with_capacity(json.len() * 3);
    let mut in_string = false;
    let mut escaped = false;
    let mut buf = [0u8; 4];

    for ch in json.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
        } else if ch == '"' {
            in_string = true;
        }

        match ch {
            ',' if !in_string && commas == CommaStyle::Escaped => encoded.push_str("%2C"),
            ',' => encoded.push(','),
            _ => encoded.push_str(&urlencoding::encode(ch.encode_utf8(&mut buf))),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_catalog;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn roster() -> Vec<Agent> {
        vec![
            Agent::new("Nguyễn Việt Anh", "agrzhrqfkqrxgjegkm"),
            Agent::new("Dương Đức Mạnh", "agsgkmrdysrrpzagne"),
        ]
    }

    #[test]
    fn test_range_for_day_offsets() {
        let slots = TimeSlots::default();
        assert_eq!(
            slots.range_for(day(2026, 1, 1)),
            TimeRange { start: 490889, end: 490912 }
        );
        assert_eq!(
            slots.range_for(day(2026, 1, 2)),
            TimeRange { start: 490913, end: 490936 }
        );
        assert_eq!(slots.range_for(day(2026, 1, 2)).to_query_value(), "[490913,490936]");
    }

    #[test]
    fn test_ticket_url_matches_reporting_ui() {
        let catalog = default_catalog();
        let planner = QueryPlanner::new("https://app.subiz.com.vn/", TimeSlots::default());
        let spec = catalog.spec("Ticket_Trong_Gio").unwrap();

        let tasks = planner.plan(day(2026, 1, 1), &roster()[..1], &[spec]);
        assert_eq!(tasks.len(), 1);
        assert_eq!(
            tasks[0].url,
            concat!(
                "https://app.subiz.com.vn/new-reports/convo-list?conditions=",
                "%5B%7B%22key%22%3A%22created_time%22,%22value%22%3A%22%5B490889,490912%5D%22%7D,",
                "%7B%22key%22%3A%22channel%22,%22value%22%3A%22%5B%5C%22subiz%5C%22,%5C%22facebook%5C%22,",
                "%5C%22facebook_comment%5C%22,%5C%22instagram%5C%22,%5C%22instagram_comment%5C%22,",
                "%5C%22form%5C%22,%5C%22google_review%5C%22%5D%22%7D,",
                "%7B%22key%22%3A%22agent_sent%22,%22value%22%3A%22%5B%5C%22yes%5C%22,%5C%22agrzhrqfkqrxgjegkm%5C%22%5D%22%7D,",
                "%7B%22key%22%3A%22business_hours%22,%22value%22%3A%22%5C%22true%5C%22%22%7D%5D"
            )
        );
    }

    #[test]
    fn test_missed_call_url_escapes_member_commas() {
        let catalog = default_catalog();
        let planner = QueryPlanner::new("https://app.subiz.com.vn", TimeSlots::default());
        let spec = catalog.spec("Miss_Call").unwrap();

        let tasks = planner.plan(day(2026, 1, 2), &roster(), &[spec]);
        assert_eq!(tasks.len(), 1);
        assert_eq!(
            tasks[0].url,
            concat!(
                "https://app.subiz.com.vn/new-reports/call-list?conditions=",
                "%5B%7B%22key%22%3A%22created_time%22%2C%22value%22%3A%22%5B490913,490936%5D%22%7D%2C",
                "%7B%22key%22%3A%22missed_call%22%7D%5D"
            )
        );
    }

    #[test]
    fn test_call_url_uses_call_list() {
        let catalog = default_catalog();
        let planner = QueryPlanner::new("https://app.subiz.com.vn", TimeSlots::default());
        let spec = catalog.spec("Call_Di_Ngoai_Gio").unwrap();

        let task = &planner.plan(day(2026, 1, 1), &roster()[..1], &[spec])[0];
        assert!(task.url.starts_with("https://app.subiz.com.vn/new-reports/call-list?conditions="));
        assert!(task.conditions.contains("%22direction%22,%22value%22%3A%22%5C%22outbound%5C%22%22"));
        assert!(task.conditions.contains("%22business_hours%22,%22value%22%3A%22%5C%22false%5C%22%22"));
    }

    #[test]
    fn test_plan_is_agent_major_then_unassigned() {
        let catalog = default_catalog();
        let planner = QueryPlanner::new("https://example.test", TimeSlots::default());
        let specs = vec![
            catalog.spec("Miss_Call").unwrap(),
            catalog.spec("Ticket_Trong_Gio").unwrap(),
            catalog.spec("Zalo_Trong_Gio").unwrap(),
        ];

        let tasks = planner.plan(day(2026, 3, 5), &roster(), &specs);
        let order: Vec<_> = tasks
            .iter()
            .map(|t| (t.agent_name().unwrap_or("-").to_string(), t.report_type.as_str()))
            .collect();

        assert_eq!(
            order,
            vec![
                ("Nguyễn Việt Anh".to_string(), "Ticket_Trong_Gio"),
                ("Nguyễn Việt Anh".to_string(), "Zalo_Trong_Gio"),
                ("Dương Đức Mạnh".to_string(), "Ticket_Trong_Gio"),
                ("Dương Đức Mạnh".to_string(), "Zalo_Trong_Gio"),
                ("-".to_string(), "Miss_Call"),
            ]
        );
        assert!(tasks.iter().all(|t| t.capture_date == day(2026, 3, 5)));
    }

    #[test]
    fn test_plan_is_deterministic() {
        let catalog = default_catalog();
        let planner = QueryPlanner::new("https://example.test", TimeSlots::default());
        let specs: Vec<_> = catalog.specs().iter().collect();

        let a: Vec<_> = planner.plan(day(2026, 2, 1), &roster(), &specs).into_iter().map(|t| t.url).collect();
        let b: Vec<_> = planner.plan(day(2026, 2, 1), &roster(), &specs).into_iter().map(|t| t.url).collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2 * 12 + 3);
    }
}
