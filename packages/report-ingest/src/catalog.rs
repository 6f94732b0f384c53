//! Report catalog: every report type the pipeline knows, what query selects
//! it, which list view renders it, and how its rows become records.
//!
//! Report types are grouped into pipelines. Each pipeline shares one
//! checkpoint and runs as a unit.

use serde::Serialize;

use crate::error::{IngestError, Result};
use crate::types::Agent;
use crate::types::TimeRange;

// ============================================================================
// Channel sets
// ============================================================================

pub const TICKET_CHANNELS: &[&str] = &[
    "subiz",
    "facebook",
    "facebook_comment",
    "instagram",
    "instagram_comment",
    "form",
    "google_review",
];

pub const ZALO_CHANNELS: &[&str] = &["zalo_personal", "zalo"];

pub const SLA_TICKET_CHANNELS: &[&str] = &[
    "form",
    "instagram_comment",
    "instagram",
    "email",
    "facebook_comment",
    "facebook",
    "subiz",
];

pub const MISSED_TICKET_CHANNELS: &[&str] = &[
    "email",
    "subiz",
    "facebook",
    "facebook_comment",
    "instagram",
    "instagram_comment",
    "form",
    "google_review",
];

/// Tag applied to conversations that were never answered.
pub const MISSED_TAG_ID: &str = "tgrzpqjrknqhxliqelct";

/// Replies slower than this count against the SLA.
const SLA_REPLY_GT_MS: u64 = 600_000;
const SLA_REPLY_LTE_MS: u64 = 86_400_000;

// ============================================================================
// Report categories and list views
// ============================================================================

/// Record schema family. Each category has exactly one schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportCategory {
    Conversation,
    Call,
    MissedConversation,
    MissedCall,
}

impl ReportCategory {
    pub fn schema(&self) -> &'static RecordSchema {
        match self {
            ReportCategory::Conversation => &CONVERSATION_SCHEMA,
            ReportCategory::Call => &CALL_SCHEMA,
            ReportCategory::MissedConversation => &MISSED_CONVERSATION_SCHEMA,
            ReportCategory::MissedCall => &MISSED_CALL_SCHEMA,
        }
    }

    /// Call-interaction reports drop zero-length calls after normalization.
    pub fn drops_zero_duration(&self) -> bool {
        matches!(self, ReportCategory::Call)
    }
}

/// Which list view of the reporting UI renders a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportList {
    Conversations,
    Calls,
}

impl ReportList {
    pub fn path(&self) -> &'static str {
        match self {
            ReportList::Conversations => "convo-list",
            ReportList::Calls => "call-list",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDirection {
    Inbound,
    Outbound,
}

impl CallDirection {
    fn as_str(&self) -> &'static str {
        match self {
            CallDirection::Inbound => "inbound",
            CallDirection::Outbound => "outbound",
        }
    }
}

// ============================================================================
// Query conditions
// ============================================================================

/// One entry of a report's condition list, before a day and agent are bound.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionTemplate {
    CreatedTime,
    Channel(&'static [&'static str]),
    /// Conversations the agent sent a message in
    AgentSent,
    /// Conversations no agent sent a message in
    NoAgentSent,
    BusinessHours(bool),
    RepliedDuration { gt_ms: u64, lte_ms: u64 },
    /// Conversations whose first reply came from the agent
    FirstRepliedBy,
    /// Calls handled by the agent
    Agent,
    Direction(CallDirection),
    Tagged(&'static str),
    MissedCall,
}

impl ConditionTemplate {
    pub fn needs_agent(&self) -> bool {
        matches!(
            self,
            ConditionTemplate::AgentSent | ConditionTemplate::FirstRepliedBy | ConditionTemplate::Agent
        )
    }

    /// Bind the template to a time range and (optionally) an agent.
    ///
    /// Agent-bound templates with no agent are dropped; the planner never
    /// asks for that combination.
    pub fn bind(&self, range: TimeRange, agent: Option<&Agent>) -> Option<Condition> {
        let keyed = |key: &'static str, value: String| Some(Condition::Keyed { key, value });

        match self {
            ConditionTemplate::CreatedTime => keyed("created_time", range.to_query_value()),
            ConditionTemplate::Channel(channels) => keyed("channel", json_string(channels)),
            ConditionTemplate::AgentSent => {
                keyed("agent_sent", json_string(&["yes", agent?.id.as_str()]))
            }
            ConditionTemplate::NoAgentSent => keyed("agent_sent", json_string(&["no"])),
            ConditionTemplate::BusinessHours(in_hours) => {
                keyed("business_hours", json_string(if *in_hours { "true" } else { "false" }))
            }
            ConditionTemplate::RepliedDuration { gt_ms, lte_ms } => Some(Condition::RepliedDuration {
                key: "replied_duration",
                replied_duration_gt: gt_ms.to_string(),
                replied_duration_lte: lte_ms.to_string(),
                r#type: "gt",
            }),
            ConditionTemplate::FirstRepliedBy => Some(Condition::FirstRepliedBy {
                key: "first_replied_duration_of",
                first_replied_duration_of: json_string(agent?.id.as_str()),
            }),
            ConditionTemplate::Agent => keyed("agent", json_string(agent?.id.as_str())),
            ConditionTemplate::Direction(direction) => {
                keyed("direction", json_string(direction.as_str()))
            }
            ConditionTemplate::Tagged(tag) => keyed("tags", json_string(&["yes", *tag])),
            ConditionTemplate::MissedCall => Some(Condition::Flag { key: "missed_call" }),
        }
    }
}

/// A bound condition as serialized into the `conditions` query parameter.
///
/// Field order is part of the wire contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Condition {
    Keyed {
        key: &'static str,
        value: String,
    },
    RepliedDuration {
        key: &'static str,
        replied_duration_gt: String,
        replied_duration_lte: String,
        r#type: &'static str,
    },
    FirstRepliedBy {
        key: &'static str,
        first_replied_duration_of: String,
    },
    Flag {
        key: &'static str,
    },
}

/// Condition values are JSON documents embedded as strings.
fn json_string<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

// ============================================================================
// Record schemas
// ============================================================================

/// How a value is read from a rendered cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellRead {
    /// Visible text
    Text,
    /// Raw text content, including visually hidden nodes
    TextContent,
    /// Tag chip titles, joined with ", "
    Tags,
    /// `title` of the avatar image, falling back to visible text
    ImageTitleOrText,
    /// `class` of the icon element
    IconClass,
    /// `title` of the timestamp span
    Stamp,
}

/// A location in a rendered row that a raw value is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Customer label anywhere in the row
    RowLabel,
    /// Tag chips anywhere in the row
    RowTags,
    /// Positional cell
    Cell { index: usize, read: CellRead },
    /// Titled timestamp span in the last cell
    LastCellStamp,
}

/// Where a record column gets its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Roster agent the task ran under, `"N/A"` when unassigned
    SystemAgent,
    /// The report type name
    ReportLabel,
    /// A row value
    Row(Source),
    /// A row value with a second location tried when the first is missing
    RowOr(Source, Source),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Plain,
    /// Blank identity means the row is not a data row
    Identity,
    /// Call length text, canonicalized to minutes-and-seconds
    Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub column: &'static str,
    pub source: FieldSource,
    pub default: &'static str,
    pub role: FieldRole,
}

const fn field(column: &'static str, source: FieldSource, default: &'static str) -> FieldSpec {
    FieldSpec {
        column,
        source,
        default,
        role: FieldRole::Plain,
    }
}

const fn identity(column: &'static str, source: Source) -> FieldSpec {
    FieldSpec {
        column,
        source: FieldSource::Row(source),
        default: "",
        role: FieldRole::Identity,
    }
}

const fn cell(index: usize, read: CellRead) -> Source {
    Source::Cell { index, read }
}

/// Column layout of one record category.
#[derive(Debug)]
pub struct RecordSchema {
    pub category: ReportCategory,
    /// Ordered record columns
    pub fields: &'static [FieldSpec],
    /// Columns that identify a row within one task's result set
    pub key_columns: &'static [&'static str],
}

impl RecordSchema {
    /// Every row location this schema reads, in field order.
    pub fn sources(&self) -> impl Iterator<Item = Source> + '_ {
        self.fields.iter().flat_map(|f| match f.source {
            FieldSource::Row(s) => [Some(s), None],
            FieldSource::RowOr(a, b) => [Some(a), Some(b)],
            FieldSource::SystemAgent | FieldSource::ReportLabel => [None, None],
        })
        .flatten()
    }

    pub fn label_column(&self) -> Option<&'static str> {
        self.column_for(|s| matches!(s, FieldSource::ReportLabel))
    }

    pub fn duration_column(&self) -> Option<&'static str> {
        self.fields
            .iter()
            .find(|f| f.role == FieldRole::Duration)
            .map(|f| f.column)
    }

    pub fn identity_column(&self) -> Option<&'static str> {
        self.fields
            .iter()
            .find(|f| f.role == FieldRole::Identity)
            .map(|f| f.column)
    }

    fn column_for(&self, pred: impl Fn(&FieldSource) -> bool) -> Option<&'static str> {
        self.fields.iter().find(|f| pred(&f.source)).map(|f| f.column)
    }
}

pub static CONVERSATION_SCHEMA: RecordSchema = RecordSchema {
    category: ReportCategory::Conversation,
    fields: &[
        field("Nhân viên hệ thống", FieldSource::SystemAgent, "N/A"),
        field("Loại", FieldSource::ReportLabel, ""),
        identity("Khách hàng", Source::RowLabel),
        field("Tags", FieldSource::Row(Source::RowTags), ""),
        field("Agent Subiz", FieldSource::Row(cell(6, CellRead::ImageTitleOrText)), "N/A"),
        field("Thời gian", FieldSource::Row(Source::LastCellStamp), "N/A"),
    ],
    key_columns: &["Khách hàng", "Thời gian", "Agent Subiz", "Tags"],
};

pub static CALL_SCHEMA: RecordSchema = RecordSchema {
    category: ReportCategory::Call,
    fields: &[
        identity("SDT", cell(1, CellRead::Text)),
        field("Trạng thái", FieldSource::Row(cell(2, CellRead::Text)), "N/A"),
        field("Tags", FieldSource::Row(cell(3, CellRead::Tags)), ""),
        FieldSpec {
            column: "Thời lượng",
            source: FieldSource::Row(cell(4, CellRead::TextContent)),
            default: "0 phút",
            role: FieldRole::Duration,
        },
        field("Agent thực hiện", FieldSource::Row(cell(6, CellRead::ImageTitleOrText)), "N/A"),
        field("Thời gian tạo", FieldSource::Row(cell(7, CellRead::Stamp)), "N/A"),
        field("Nhân viên hệ thống", FieldSource::SystemAgent, "N/A"),
        field("Loại cuộc gọi", FieldSource::ReportLabel, ""),
    ],
    key_columns: &["SDT", "Thời gian tạo", "Agent thực hiện", "Thời lượng"],
};

pub static MISSED_CONVERSATION_SCHEMA: RecordSchema = RecordSchema {
    category: ReportCategory::MissedConversation,
    fields: &[
        field("Loại", FieldSource::ReportLabel, ""),
        identity("Khách hàng", Source::RowLabel),
        field("Tags", FieldSource::Row(Source::RowTags), ""),
        field("Channel_Code", FieldSource::Row(cell(1, CellRead::IconClass)), "N/A"),
        field("Thời gian", FieldSource::Row(Source::LastCellStamp), "N/A"),
        field("Nhân viên hệ thống", FieldSource::SystemAgent, "N/A"),
    ],
    key_columns: &["Khách hàng", "Thời gian", "Channel_Code"],
};

pub static MISSED_CALL_SCHEMA: RecordSchema = RecordSchema {
    category: ReportCategory::MissedCall,
    fields: &[
        identity("SDT", cell(1, CellRead::Text)),
        field("Trạng thái", FieldSource::Row(cell(2, CellRead::Text)), "N/A"),
        field(
            "Thời gian tạo",
            FieldSource::RowOr(cell(7, CellRead::Stamp), Source::LastCellStamp),
            "N/A",
        ),
        field("Loại báo cáo", FieldSource::ReportLabel, ""),
        field("Nhân viên hệ thống", FieldSource::SystemAgent, "N/A"),
    ],
    key_columns: &["SDT", "Thời gian tạo"],
};

// ============================================================================
// Report specs and pipelines
// ============================================================================

/// How commas between JSON members are written in a query URL.
///
/// Commas inside string values are always literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommaStyle {
    #[default]
    Literal,
    /// `%2C`, as the missed-call list link is written
    Escaped,
}

/// Everything needed to query and record one report type.
#[derive(Debug, Clone)]
pub struct ReportSpec {
    pub name: String,
    pub category: ReportCategory,
    pub list: ReportList,
    pub conditions: Vec<ConditionTemplate>,
    pub commas: CommaStyle,
}

impl ReportSpec {
    pub fn new(
        name: impl Into<String>,
        category: ReportCategory,
        list: ReportList,
        conditions: Vec<ConditionTemplate>,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            list,
            conditions,
            commas: CommaStyle::Literal,
        }
    }

    pub fn with_commas(mut self, commas: CommaStyle) -> Self {
        self.commas = commas;
        self
    }

    /// Whether one task per roster agent is planned for this report.
    pub fn per_agent(&self) -> bool {
        self.conditions.iter().any(ConditionTemplate::needs_agent)
    }

    pub fn schema(&self) -> &'static RecordSchema {
        self.category.schema()
    }

    /// Bind every condition, in declared order.
    pub fn bind(&self, range: TimeRange, agent: Option<&Agent>) -> Vec<Condition> {
        self.conditions
            .iter()
            .filter_map(|c| c.bind(range, agent))
            .collect()
    }
}

/// An ordered group of report types sharing one checkpoint.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub name: String,
    /// Report type names in checkpoint priority order
    pub report_types: Vec<String>,
}

/// The full table of known report types and pipelines.
#[derive(Debug, Clone)]
pub struct ReportCatalog {
    specs: Vec<ReportSpec>,
    pipelines: Vec<Pipeline>,
}

impl ReportCatalog {
    pub fn new(specs: Vec<ReportSpec>, pipelines: Vec<Pipeline>) -> Self {
        Self { specs, pipelines }
    }

    pub fn spec(&self, name: &str) -> Result<&ReportSpec> {
        self.specs
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| IngestError::UnknownReportType(name.to_string()))
    }

    pub fn specs(&self) -> &[ReportSpec] {
        &self.specs
    }

    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    pub fn pipeline(&self, name: &str) -> Result<&Pipeline> {
        self.pipelines
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| IngestError::UnknownPipeline(name.to_string()))
    }

    /// Specs of one pipeline, in pipeline order.
    pub fn pipeline_specs(&self, pipeline: &Pipeline) -> Result<Vec<&ReportSpec>> {
        pipeline.report_types.iter().map(|name| self.spec(name)).collect()
    }

    /// Resolve a pipeline selection. An empty selection means all pipelines.
    pub fn select(&self, names: &[String]) -> Result<Vec<&Pipeline>> {
        if names.is_empty() {
            return Ok(self.pipelines.iter().collect());
        }
        names.iter().map(|n| self.pipeline(n)).collect()
    }
}

impl Default for ReportCatalog {
    fn default() -> Self {
        default_catalog()
    }
}

fn conversation_report(channels: &'static [&'static str], in_hours: bool) -> Vec<ConditionTemplate> {
    vec![
        ConditionTemplate::CreatedTime,
        ConditionTemplate::Channel(channels),
        ConditionTemplate::AgentSent,
        ConditionTemplate::BusinessHours(in_hours),
    ]
}

fn sla_report(channels: &'static [&'static str], in_hours: bool) -> Vec<ConditionTemplate> {
    vec![
        ConditionTemplate::CreatedTime,
        ConditionTemplate::BusinessHours(in_hours),
        ConditionTemplate::RepliedDuration {
            gt_ms: SLA_REPLY_GT_MS,
            lte_ms: SLA_REPLY_LTE_MS,
        },
        ConditionTemplate::FirstRepliedBy,
        ConditionTemplate::Channel(channels),
    ]
}

fn call_report(direction: CallDirection, in_hours: bool) -> Vec<ConditionTemplate> {
    vec![
        ConditionTemplate::CreatedTime,
        ConditionTemplate::Agent,
        ConditionTemplate::Direction(direction),
        ConditionTemplate::BusinessHours(in_hours),
    ]
}

fn missed_conversation_report(channels: &'static [&'static str]) -> Vec<ConditionTemplate> {
    vec![
        ConditionTemplate::CreatedTime,
        ConditionTemplate::Channel(channels),
        ConditionTemplate::NoAgentSent,
        ConditionTemplate::Tagged(MISSED_TAG_ID),
    ]
}

/// The report types of the Subiz reporting UI, grouped into the
/// `conversations`, `calls` and `missed` pipelines.
pub fn default_catalog() -> ReportCatalog {
    use CallDirection::{Inbound, Outbound};
    use ReportCategory::*;
    use ReportList::{Calls, Conversations};

    let specs = vec![
        ReportSpec::new("Ticket_Trong_Gio", Conversation, Conversations, conversation_report(TICKET_CHANNELS, true)),
        ReportSpec::new("Ticket_Ngoai_Gio", Conversation, Conversations, conversation_report(TICKET_CHANNELS, false)),
        ReportSpec::new("Zalo_Trong_Gio", Conversation, Conversations, conversation_report(ZALO_CHANNELS, true)),
        ReportSpec::new("Zalo_Ngoai_Gio", Conversation, Conversations, conversation_report(ZALO_CHANNELS, false)),
        ReportSpec::new("SLA_Ticket_Trong_Gio", Conversation, Conversations, sla_report(SLA_TICKET_CHANNELS, true)),
        ReportSpec::new("SLA_Ticket_Ngoai_Gio", Conversation, Conversations, sla_report(SLA_TICKET_CHANNELS, false)),
        ReportSpec::new("SLA_Zalo_Trong_Gio", Conversation, Conversations, sla_report(ZALO_CHANNELS, true)),
        ReportSpec::new("SLA_Zalo_Ngoai_Gio", Conversation, Conversations, sla_report(ZALO_CHANNELS, false)),
        ReportSpec::new("Call_Den_Trong_Gio", Call, Calls, call_report(Inbound, true)),
        ReportSpec::new("Call_Di_Trong_Gio", Call, Calls, call_report(Outbound, true)),
        ReportSpec::new("Call_Den_Ngoai_Gio", Call, Calls, call_report(Inbound, false)),
        ReportSpec::new("Call_Di_Ngoai_Gio", Call, Calls, call_report(Outbound, false)),
        ReportSpec::new("Miss_Hoi_Thoai", MissedConversation, Conversations, missed_conversation_report(MISSED_TICKET_CHANNELS)),
        ReportSpec::new("Miss_Zalo", MissedConversation, Conversations, missed_conversation_report(ZALO_CHANNELS)),
        ReportSpec::new(
            "Miss_Call",
            MissedCall,
            Calls,
            vec![ConditionTemplate::CreatedTime, ConditionTemplate::MissedCall],
        )
        .with_commas(CommaStyle::Escaped),
    ];

    let pipeline = |name: &str, category: &[ReportCategory]| Pipeline {
        name: name.to_string(),
        report_types: specs
            .iter()
            .filter(|s| category.contains(&s.category))
            .map(|s| s.name.clone())
            .collect(),
    };

    let pipelines = vec![
        pipeline("conversations", &[Conversation]),
        pipeline("calls", &[Call]),
        pipeline("missed", &[MissedConversation, MissedCall]),
    ];

    ReportCatalog::new(specs, pipelines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> Agent {
        Agent::new("Nguyễn Việt Anh", "agrzhrqfkqrxgjegkm")
    }

    const RANGE: TimeRange = TimeRange {
        start: 490889,
        end: 490912,
    };

    #[test]
    fn test_default_catalog_pipelines() {
        let catalog = default_catalog();
        let names: Vec<_> = catalog.pipelines().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["conversations", "calls", "missed"]);

        let conversations = catalog.pipeline("conversations").unwrap();
        assert_eq!(conversations.report_types.len(), 8);
        assert_eq!(conversations.report_types[0], "Ticket_Trong_Gio");

        let missed = catalog.pipeline("missed").unwrap();
        assert_eq!(missed.report_types, vec!["Miss_Hoi_Thoai", "Miss_Zalo", "Miss_Call"]);
    }

    #[test]
    fn test_unknown_names_are_errors() {
        let catalog = default_catalog();
        assert!(matches!(catalog.spec("Nope"), Err(IngestError::UnknownReportType(_))));
        assert!(matches!(
            catalog.select(&["nope".to_string()]),
            Err(IngestError::UnknownPipeline(_))
        ));
        assert_eq!(catalog.select(&[]).unwrap().len(), 3);
    }

    #[test]
    fn test_missed_reports_are_not_per_agent() {
        let catalog = default_catalog();
        assert!(catalog.spec("Ticket_Trong_Gio").unwrap().per_agent());
        assert!(catalog.spec("Call_Di_Ngoai_Gio").unwrap().per_agent());
        assert!(!catalog.spec("Miss_Hoi_Thoai").unwrap().per_agent());
        assert!(!catalog.spec("Miss_Call").unwrap().per_agent());
    }

    #[test]
    fn test_sla_condition_serialization_keeps_field_order() {
        let catalog = default_catalog();
        let spec = catalog.spec("SLA_Zalo_Trong_Gio").unwrap();
        let json = serde_json::to_string(&spec.bind(RANGE, Some(&agent()))).unwrap();

        assert_eq!(
            json,
            concat!(
                r#"[{"key":"created_time","value":"[490889,490912]"},"#,
                r#"{"key":"business_hours","value":"\"true\""},"#,
                r#"{"key":"replied_duration","replied_duration_gt":"600000","replied_duration_lte":"86400000","type":"gt"},"#,
                r#"{"key":"first_replied_duration_of","first_replied_duration_of":"\"agrzhrqfkqrxgjegkm\""},"#,
                r#"{"key":"channel","value":"[\"zalo_personal\",\"zalo\"]"}]"#
            )
        );
    }

    #[test]
    fn test_missed_call_conditions() {
        let catalog = default_catalog();
        let spec = catalog.spec("Miss_Call").unwrap();
        let json = serde_json::to_string(&spec.bind(RANGE, None)).unwrap();
        assert_eq!(
            json,
            r#"[{"key":"created_time","value":"[490889,490912]"},{"key":"missed_call"}]"#
        );
    }

    #[test]
    fn test_schema_columns() {
        assert_eq!(CONVERSATION_SCHEMA.label_column(), Some("Loại"));
        assert_eq!(CALL_SCHEMA.label_column(), Some("Loại cuộc gọi"));
        assert_eq!(MISSED_CALL_SCHEMA.label_column(), Some("Loại báo cáo"));
        assert_eq!(CALL_SCHEMA.duration_column(), Some("Thời lượng"));
        assert_eq!(CONVERSATION_SCHEMA.duration_column(), None);
        assert_eq!(MISSED_CONVERSATION_SCHEMA.identity_column(), Some("Khách hàng"));

        let sources: Vec<_> = MISSED_CALL_SCHEMA.sources().collect();
        assert!(sources.contains(&Source::LastCellStamp));
        assert!(sources.contains(&cell(7, CellRead::Stamp)));
    }
}
