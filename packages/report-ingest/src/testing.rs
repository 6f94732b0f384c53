//! Testing utilities: report page builders and fast scraper settings.
//!
//! Pages are shaped like the reporting UI's list views, so they can be served
//! by [`HtmlFixtureBrowser`] and read with the default [`PageLayout`].
//!
//! [`PageLayout`]: crate::pipeline::PageLayout

use std::time::Duration;

use crate::pipeline::ScraperSettings;
use crate::wait::WaitPolicy;

pub use crate::browser::HtmlFixtureBrowser;
pub use crate::stores::MemoryStore;

/// One row of a conversation list.
#[derive(Debug, Clone, Default)]
pub struct ConversationRow {
    pub customer: String,
    /// Channel icon class, e.g. `zalo`
    pub channel_icon: String,
    pub tags: Vec<String>,
    pub agent: String,
    pub stamp: String,
}

impl ConversationRow {
    pub fn new(customer: impl Into<String>, stamp: impl Into<String>) -> Self {
        Self {
            customer: customer.into(),
            stamp: stamp.into(),
            channel_icon: "icon-channel".into(),
            ..Default::default()
        }
    }

    pub fn agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn channel(mut self, icon: impl Into<String>) -> Self {
        self.channel_icon = icon.into();
        self
    }

    pub fn html(&self) -> String {
        let agent = if self.agent.is_empty() {
            String::new()
        } else {
            format!(r#"<img src="a.png" title="{}">"#, self.agent)
        };
        format!(
            concat!(
                "<tr>",
                r#"<td><input type="checkbox"></td>"#,
                r#"<td><i class="{icon}"></i></td>"#,
                r#"<td><span class="ml-3">{customer}</span></td>"#,
                "<td>{tags}</td>",
                "<td></td><td></td>",
                "<td>{agent}</td>",
                r#"<td><span title="{stamp}">vừa xong</span></td>"#,
                "</tr>"
            ),
            icon = self.channel_icon,
            customer = self.customer,
            tags = tag_chips(&self.tags),
            agent = agent,
            stamp = self.stamp,
        )
    }
}

/// One row of a call list.
#[derive(Debug, Clone, Default)]
pub struct CallRow {
    pub phone: String,
    pub status: String,
    pub tags: Vec<String>,
    pub duration: String,
    pub agent: String,
    pub stamp: String,
}

impl CallRow {
    pub fn new(phone: impl Into<String>, duration: impl Into<String>, stamp: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            status: "Đã nghe".into(),
            duration: duration.into(),
            stamp: stamp.into(),
            ..Default::default()
        }
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    pub fn html(&self) -> String {
        format!(
            concat!(
                "<tr>",
                r#"<td><input type="checkbox"></td>"#,
                "<td>{phone}</td>",
                "<td>{status}</td>",
                "<td>{tags}</td>",
                "<td>{duration}</td>",
                "<td></td>",
                r#"<td><img src="a.png" title="{agent}"></td>"#,
                r#"<td><span title="{stamp}">vừa xong</span></td>"#,
                "</tr>"
            ),
            phone = self.phone,
            status = self.status,
            tags = tag_chips(&self.tags),
            duration = self.duration,
            agent = self.agent,
            stamp = self.stamp,
        )
    }
}

fn tag_chips(tags: &[String]) -> String {
    tags.iter()
        .map(|t| format!(r#"<div class="convo_tag"><span class="convo_tag__title">{}</span></div>"#, t))
        .collect()
}

/// A list page showing `rows` out of `total`, with a next control.
pub fn report_page(total: usize, rows: &[String], next_enabled: bool) -> String {
    let disabled = if next_enabled { "" } else { " disabled" };
    format!(
        concat!(
            "<html><head><title>Báo cáo</title></head><body>",
            r#"<div class="lead-actions">"#,
            r#"<div class="lead-actions__paginate-info">Hiển thị 1 - {shown} trong tổng số <b>{total}</b></div>"#,
            r#"<div class="lead-actions__paginate"><button class="prev">‹</button><button class="next"{disabled}>›</button></div>"#,
            "</div>",
            r#"<div class="scroll-table-wrapper"><table class="scroll-table">"#,
            "<thead><tr><th></th><th>Kênh</th><th>Khách hàng</th><th>Tags</th></tr></thead>",
            "<tbody>{rows}</tbody>",
            "</table></div>",
            "</body></html>"
        ),
        shown = rows.len(),
        total = total,
        disabled = disabled,
        rows = rows.concat(),
    )
}

/// A list page for a query with no results.
pub fn empty_report_page() -> String {
    report_page(0, &[], false)
}

/// Scraper settings with millisecond waits, for tests against fixtures.
pub fn fast_settings() -> ScraperSettings {
    ScraperSettings {
        render: WaitPolicy::fixed(Duration::from_millis(5), Duration::from_millis(30)),
        settle: WaitPolicy::fixed(Duration::from_millis(5), Duration::from_millis(30)),
        task_deadline: Duration::from_secs(5),
        max_pages: 20,
    }
}
