//! Pagination state machine for one scrape task.
//!
//! ```text
//! Loading → ReadingTotal → Extracting ⇄ Paginating → Done
//! ```
//!
//! A task never fails outward. Every fault it meets ends it with whatever it
//! had accumulated, and the fault is reported on the outcome.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tokio::time::sleep;

use crate::catalog::{CellRead, RecordSchema, ReportSpec, Source};
use crate::error::{DriverError, ScrapeError};
use crate::normalizer::{natural_key, normalize, retain, RawRow};
use crate::traits::BrowserDriver;
use crate::types::{ReportRecord, ScrapeTask};
use crate::wait::{poll_until, WaitPolicy};

static RE_TOTAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"tổng số\s+(\d+)").unwrap());

// ============================================================================
// Configuration
// ============================================================================

/// Where things live on a rendered report page.
#[derive(Debug, Clone)]
pub struct PageLayout {
    /// Page text carrying the result total in its first capture group
    pub total_pattern: Regex,
    /// Element whose text is the bare total, tried when the pattern misses
    pub total_fallback: String,
    /// Scrollable results container
    pub container: String,
    pub rows: String,
    /// Row selector tried when `rows` matches nothing
    pub rows_fallback: String,
    pub next_control: String,
    pub cell: String,
    pub row_label: String,
    pub tag: String,
    pub image: String,
    pub icon: String,
    pub stamp: String,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            total_pattern: RE_TOTAL.clone(),
            total_fallback: ".lead-actions__paginate-info b:last-child".into(),
            container: ".scroll-table-wrapper".into(),
            rows: "table.scroll-table tbody tr".into(),
            rows_fallback: "table.scroll-table tr".into(),
            next_control: ".lead-actions__paginate button:last-child".into(),
            cell: "td".into(),
            row_label: "span.ml-3".into(),
            tag: ".convo_tag__title".into(),
            image: "img".into(),
            icon: "i".into(),
            stamp: "span[title]".into(),
        }
    }
}

/// Waits and bounds applied to every task.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperSettings {
    /// Wait for the result total after navigation
    pub render: WaitPolicy,
    /// Wait for rows to render and for a page change after a click
    pub settle: WaitPolicy,
    #[serde(deserialize_with = "secs")]
    pub task_deadline: Duration,
    pub max_pages: usize,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            render: WaitPolicy::new(
                Duration::from_millis(500),
                Duration::from_secs(2),
                Duration::from_secs(15),
            ),
            settle: WaitPolicy::new(
                Duration::from_millis(250),
                Duration::from_secs(1),
                Duration::from_secs(8),
            ),
            task_deadline: Duration::from_secs(600),
            max_pages: 200,
        }
    }
}

fn secs<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_secs)
}

// ============================================================================
// Outcome
// ============================================================================

/// How a task ended.
#[derive(Debug)]
pub enum TaskEnd {
    /// No total, or a total of zero
    Empty,
    /// Accumulated at least the expected total
    Complete,
    /// Next control missing, disabled, or not clickable
    Exhausted,
    /// Stopped by a contained fault
    Aborted(ScrapeError),
}

#[derive(Debug)]
pub struct ScrapeOutcome {
    pub report_type: String,
    pub agent: Option<String>,
    pub records: Vec<ReportRecord>,
    pub expected_total: usize,
    pub pages: usize,
    pub end: TaskEnd,
}

impl ScrapeOutcome {
    pub fn fault(&self) -> Option<&ScrapeError> {
        match &self.end {
            TaskEnd::Aborted(err) => Some(err),
            _ => None,
        }
    }
}

// ============================================================================
// State machine
// ============================================================================

#[derive(Debug)]
enum PageState {
    Loading,
    ReadingTotal,
    Extracting,
    Paginating,
    Done(TaskEnd),
}

/// Per-task accumulator. Lives outside the task future so that a deadline
/// does not discard what was already read.
#[derive(Default)]
struct Accumulator {
    records: Vec<ReportRecord>,
    seen: HashSet<Vec<String>>,
    expected: usize,
    pages: usize,
    skipped: usize,
    filtered: usize,
}

impl Accumulator {
    fn push(&mut self, record: ReportRecord, schema: &RecordSchema) {
        if self.seen.insert(natural_key(&record, schema)) {
            self.records.push(record);
        }
    }
}

pub struct PageScraper<D: BrowserDriver> {
    driver: D,
    layout: PageLayout,
    settings: ScraperSettings,
}

impl<D: BrowserDriver> PageScraper<D> {
    pub fn new(driver: D, layout: PageLayout, settings: ScraperSettings) -> Self {
        Self {
            driver,
            layout,
            settings,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Run one task to completion.
    pub async fn scrape(&self, task: &ScrapeTask, spec: &ReportSpec) -> ScrapeOutcome {
        let mut acc = Accumulator::default();
        let deadline = self.settings.task_deadline;

        let end = match tokio::time::timeout(deadline, self.drive(task, spec, &mut acc)).await {
            Ok(end) => end,
            Err(_) => TaskEnd::Aborted(ScrapeError::Deadline { limit: deadline }),
        };

        match &end {
            TaskEnd::Aborted(err) => tracing::warn!(
                report_type = %task.report_type,
                agent = task.agent_name().unwrap_or("-"),
                records = acc.records.len(),
                expected = acc.expected,
                error = %err,
                "Task aborted, keeping accumulated rows"
            ),
            _ => tracing::info!(
                report_type = %task.report_type,
                agent = task.agent_name().unwrap_or("-"),
                records = acc.records.len(),
                expected = acc.expected,
                pages = acc.pages,
                skipped = acc.skipped,
                filtered = acc.filtered,
                "Task finished"
            ),
        }

        ScrapeOutcome {
            report_type: task.report_type.clone(),
            agent: task.agent_name().map(str::to_string),
            records: acc.records,
            expected_total: acc.expected,
            pages: acc.pages,
            end,
        }
    }

    async fn drive(&self, task: &ScrapeTask, spec: &ReportSpec, acc: &mut Accumulator) -> TaskEnd {
        let mut state = PageState::Loading;

        loop {
            state = match state {
                PageState::Loading => match self.driver.navigate(&task.url).await {
                    Ok(()) => PageState::ReadingTotal,
                    Err(err) => PageState::Done(TaskEnd::Aborted(err.into())),
                },

                PageState::ReadingTotal => {
                    match poll_until(&self.settings.render, "result total", || self.read_total()).await {
                        Ok(0) => PageState::Done(TaskEnd::Empty),
                        Ok(total) => {
                            acc.expected = total;
                            PageState::Extracting
                        }
                        Err(_) => {
                            tracing::debug!(report_type = %task.report_type, "No result total rendered");
                            PageState::Done(TaskEnd::Empty)
                        }
                    }
                }

                PageState::Extracting => {
                    acc.pages += 1;
                    match self.extract_page(task, spec, acc).await {
                        Ok(()) => PageState::Paginating,
                        Err(err) => PageState::Done(TaskEnd::Aborted(err)),
                    }
                }

                PageState::Paginating => {
                    if acc.records.len() >= acc.expected {
                        PageState::Done(TaskEnd::Complete)
                    } else if acc.pages >= self.settings.max_pages {
                        PageState::Done(TaskEnd::Aborted(ScrapeError::PageLimit {
                            limit: self.settings.max_pages,
                        }))
                    } else {
                        self.next_page().await
                    }
                }

                PageState::Done(end) => return end,
            };
        }
    }

    /// Total from the summary text, or from the fallback element.
    async fn read_total(&self) -> Option<usize> {
        if let Ok(Some(text)) = self.driver.find_text_matching(&self.layout.total_pattern).await {
            let total = self
                .layout
                .total_pattern
                .captures(&text)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok());
            if total.is_some() {
                return total;
            }
        }

        let element = self
            .driver
            .find_elements(&self.layout.total_fallback)
            .await
            .ok()?
            .into_iter()
            .next()?;
        let text = self.driver.read_text(&element).await.ok()?;
        text.trim().parse().ok()
    }

    async fn find_rows(&self) -> Vec<D::Element> {
        match self.driver.find_elements(&self.layout.rows).await {
            Ok(rows) if !rows.is_empty() => rows,
            _ => self
                .driver
                .find_elements(&self.layout.rows_fallback)
                .await
                .unwrap_or_default(),
        }
    }

    async fn extract_page(
        &self,
        task: &ScrapeTask,
        spec: &ReportSpec,
        acc: &mut Accumulator,
    ) -> Result<(), ScrapeError> {
        let container = self
            .driver
            .find_elements(&self.layout.container)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DriverError::Query {
                selector: self.layout.container.clone(),
                reason: "results container not rendered".into(),
            })?;
        self.driver.scroll_into_view(&container).await?;

        let rendered = poll_until(&self.settings.settle, "result rows", || async {
            let rows = self.find_rows().await;
            (!rows.is_empty()).then_some(rows)
        })
        .await;

        let rows = match rendered {
            Ok(rows) => {
                // Lazily rendered tables only fill in once the tail is visible.
                if let Some(last) = rows.last() {
                    let _ = self.driver.scroll_into_view(last).await;
                }
                self.find_rows().await
            }
            Err(_) => Vec::new(),
        };

        let schema = spec.schema();
        for row in &rows {
            let raw = self.read_row(row, schema).await;
            match normalize(&raw, spec, task.agent.as_ref()) {
                Some(record) if retain(&record, spec.category) => acc.push(record, schema),
                Some(_) => acc.filtered += 1,
                None => acc.skipped += 1,
            }
        }

        tracing::debug!(
            report_type = %task.report_type,
            page = acc.pages,
            rows = rows.len(),
            accumulated = acc.records.len(),
            "Extracted page"
        );
        Ok(())
    }

    async fn next_page(&self) -> PageState {
        let control = match self.driver.find_elements(&self.layout.next_control).await {
            Ok(found) => found.into_iter().next(),
            Err(_) => None,
        };
        let Some(control) = control else {
            return PageState::Done(TaskEnd::Exhausted);
        };

        match self.driver.read_attribute(&control, "disabled").await {
            Ok(None) => {}
            _ => return PageState::Done(TaskEnd::Exhausted),
        }

        let marker = poll_until(&self.settings.settle, "page marker", || self.first_row_text())
            .await
            .ok();
        if self.driver.click(&control).await.is_err() {
            return PageState::Done(TaskEnd::Exhausted);
        }

        // Without a marker a page change cannot be observed; settle instead.
        let Some(marker) = marker else {
            tracing::debug!("First rows unreadable, settling before extraction");
            sleep(self.settings.settle.max_interval).await;
            return PageState::Extracting;
        };

        let changed = poll_until(&self.settings.settle, "next page", || async {
            self.first_row_text()
                .await
                .filter(|current| *current != marker)
                .map(|_| ())
        })
        .await;

        match changed {
            Ok(()) => PageState::Extracting,
            Err(err) => PageState::Done(TaskEnd::Aborted(err)),
        }
    }

    async fn first_row_text(&self) -> Option<String> {
        let rows = self.find_rows().await;
        let mut texts = Vec::with_capacity(2);
        // Skip a header row picked up by the fallback selector.
        for row in rows.iter().take(2) {
            texts.push(self.driver.read_text(row).await.ok()?);
        }
        Some(texts.join("\n"))
    }

    // ------------------------------------------------------------------------
    // Row reading. Every location is read independently; failures leave the
    // location absent so the normalizer applies its default.
    // ------------------------------------------------------------------------

    async fn read_row(&self, row: &D::Element, schema: &RecordSchema) -> RawRow {
        let cells = self
            .driver
            .find_within(row, &self.layout.cell)
            .await
            .unwrap_or_default();

        let mut raw = RawRow::new();
        for source in schema.sources() {
            if let Some(value) = self.read_source(row, &cells, source).await {
                raw.insert(source, value);
            }
        }
        raw
    }

    async fn read_source(&self, row: &D::Element, cells: &[D::Element], source: Source) -> Option<String> {
        match source {
            Source::RowLabel => {
                let label = self.first_within(row, &self.layout.row_label).await?;
                self.driver.read_text(&label).await.ok()
            }
            Source::RowTags => self.read_tags(row).await,
            Source::Cell { index, read } => self.read_cell(cells.get(index)?, read).await,
            Source::LastCellStamp => self.read_cell(cells.last()?, CellRead::Stamp).await,
        }
    }

    async fn read_cell(&self, cell: &D::Element, read: CellRead) -> Option<String> {
        match read {
            CellRead::Text => self.driver.read_text(cell).await.ok(),
            CellRead::TextContent => self.driver.read_attribute(cell, "textContent").await.ok()?,
            CellRead::Tags => self.read_tags(cell).await,
            CellRead::ImageTitleOrText => {
                if let Some(image) = self.first_within(cell, &self.layout.image).await {
                    if let Ok(Some(title)) = self.driver.read_attribute(&image, "title").await {
                        return Some(title);
                    }
                }
                self.driver.read_text(cell).await.ok()
            }
            CellRead::IconClass => {
                let icon = self.first_within(cell, &self.layout.icon).await?;
                self.driver.read_attribute(&icon, "class").await.ok()?
            }
            CellRead::Stamp => {
                let stamp = self.first_within(cell, &self.layout.stamp).await?;
                self.driver.read_attribute(&stamp, "title").await.ok()?
            }
        }
    }

    async fn read_tags(&self, scope: &D::Element) -> Option<String> {
        let chips = self.driver.find_within(scope, &self.layout.tag).await.ok()?;
        let mut titles = Vec::with_capacity(chips.len());
        for chip in &chips {
            if let Ok(text) = self.driver.read_text(chip).await {
                titles.push(text.trim().to_string());
            }
        }
        Some(titles.join(", "))
    }

    async fn first_within(&self, scope: &D::Element, selector: &str) -> Option<D::Element> {
        self.driver
            .find_within(scope, selector)
            .await
            .ok()?
            .into_iter()
            .next()
    }
}
