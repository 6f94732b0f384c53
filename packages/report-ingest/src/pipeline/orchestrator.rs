//! The day-by-day ingestion loop.
//!
//! Per pipeline: resolve the checkpoint once, then for every day up to
//! yesterday plan → scrape → aggregate → merge. A day's merges only start
//! after all of its scraping is done. Store faults stop the run where it is;
//! merges already written stay written.

use chrono::{Days, NaiveDate};
use indexmap::IndexMap;

use crate::catalog::{Pipeline, ReportCatalog, ReportSpec};
use crate::dataset::Datasets;
use crate::error::{IngestError, Result};
use crate::pipeline::aggregate::DayAggregator;
use crate::pipeline::checkpoint::{Checkpoint, CheckpointPolicy, CheckpointResolver};
use crate::pipeline::merge::{DatasetMerger, MergeOutcome};
use crate::pipeline::planner::QueryPlanner;
use crate::pipeline::scrape::PageScraper;
use crate::traits::{BrowserDriver, DatasetStore};
use crate::types::Agent;

/// Bounds of one run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Start here instead of at the resolved checkpoint
    pub from: Option<NaiveDate>,
    /// Last day to process; capped at yesterday
    pub until: Option<NaiveDate>,
    /// Reference day; processing stops before it
    pub today: NaiveDate,
}

impl RunOptions {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            from: None,
            until: None,
            today,
        }
    }

    pub fn last_day(&self) -> NaiveDate {
        let yesterday = self.today.pred_opt().unwrap_or(self.today);
        match self.until {
            Some(until) => until.min(yesterday),
            None => yesterday,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Resolved(NaiveDate),
    Processing(NaiveDate),
    CaughtUp,
}

/// What happened on one day.
#[derive(Debug, Default)]
pub struct DayReport {
    pub date: NaiveDate,
    pub tasks: usize,
    /// Tasks that ended on a contained fault
    pub task_faults: usize,
    pub records_scraped: usize,
    /// Merges performed, per report type
    pub written: IndexMap<String, MergeOutcome>,
    /// Report types not scraped because their dataset already covers the day
    pub skipped: Vec<String>,
}

impl DayReport {
    pub fn rows_written(&self) -> usize {
        self.written.values().map(|m| m.appended).sum()
    }
}

#[derive(Debug)]
pub struct PipelineReport {
    pub pipeline: String,
    pub checkpoint: Checkpoint,
    pub start: NaiveDate,
    pub days: Vec<DayReport>,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub pipelines: Vec<PipelineReport>,
    /// The fault that stopped the run, if any
    pub aborted: Option<IngestError>,
}

impl RunReport {
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    pub fn rows_written(&self) -> usize {
        self.pipelines
            .iter()
            .flat_map(|p| &p.days)
            .map(DayReport::rows_written)
            .sum()
    }
}

pub struct Orchestrator<D: BrowserDriver, S: DatasetStore> {
    catalog: ReportCatalog,
    agents: Vec<Agent>,
    planner: QueryPlanner,
    scraper: PageScraper<D>,
    datasets: Datasets<S>,
    resolver: CheckpointResolver,
    merger: DatasetMerger,
}

impl<D: BrowserDriver, S: DatasetStore> Orchestrator<D, S> {
    pub fn new(
        catalog: ReportCatalog,
        agents: Vec<Agent>,
        planner: QueryPlanner,
        scraper: PageScraper<D>,
        datasets: Datasets<S>,
        resolver: CheckpointResolver,
        merger: DatasetMerger,
    ) -> Self {
        Self {
            catalog,
            agents,
            planner,
            scraper,
            datasets,
            resolver,
            merger,
        }
    }

    pub fn datasets(&self) -> &Datasets<S> {
        &self.datasets
    }

    pub fn scraper(&self) -> &PageScraper<D> {
        &self.scraper
    }

    /// Resolve the checkpoint of each selected pipeline without scraping.
    pub async fn checkpoints(&self, pipelines: &[String]) -> Result<Vec<(String, Checkpoint)>> {
        let mut resolved = Vec::new();
        for pipeline in self.catalog.select(pipelines)? {
            let checkpoint = self
                .resolver
                .resolve(&self.datasets, &pipeline.report_types)
                .await?;
            resolved.push((pipeline.name.clone(), checkpoint));
        }
        Ok(resolved)
    }

    /// Run the selected pipelines (all when empty) in catalog order.
    ///
    /// Only an unknown pipeline name fails the call. Faults during the run
    /// stop it and are returned on the report along with the days that
    /// completed.
    pub async fn run(&self, pipelines: &[String], options: &RunOptions) -> Result<RunReport> {
        let selected = self.catalog.select(pipelines)?;
        let mut report = RunReport::default();

        for pipeline in selected {
            if let Err(err) = self.run_pipeline(pipeline, options, &mut report).await {
                tracing::error!(pipeline = %pipeline.name, error = %err, "Run aborted");
                report.aborted = Some(err);
                break;
            }
        }

        Ok(report)
    }

    async fn run_pipeline(&self, pipeline: &Pipeline, options: &RunOptions, report: &mut RunReport) -> Result<()> {
        let specs = self.catalog.pipeline_specs(pipeline)?;
        let checkpoint = self
            .resolver
            .resolve(&self.datasets, &pipeline.report_types)
            .await?;

        let start = options.from.unwrap_or(checkpoint.next_day);
        let mut days = Vec::new();
        let result = self
            .process_days(pipeline, &specs, &checkpoint, start, options.last_day(), &mut days)
            .await;

        report.pipelines.push(PipelineReport {
            pipeline: pipeline.name.clone(),
            checkpoint,
            start,
            days,
        });
        result
    }

    async fn process_days(
        &self,
        pipeline: &Pipeline,
        specs: &[&ReportSpec],
        checkpoint: &Checkpoint,
        start: NaiveDate,
        last: NaiveDate,
        days: &mut Vec<DayReport>,
    ) -> Result<()> {
        let mut state = RunState::Resolved(start);
        loop {
            state = match state {
                RunState::Resolved(day) if day > last => {
                    tracing::info!(pipeline = %pipeline.name, next_day = %day, "Already caught up");
                    RunState::CaughtUp
                }
                RunState::Resolved(day) => RunState::Processing(day),

                RunState::Processing(day) => {
                    tracing::info!(pipeline = %pipeline.name, day = %day, "Processing day");
                    // A day that fails mid-merge still reports what it wrote.
                    match self.process_day(day, specs, checkpoint).await {
                        Ok(day_report) => days.push(day_report),
                        Err((day_report, err)) => {
                            days.push(day_report);
                            return Err(err);
                        }
                    }

                    match day.checked_add_days(Days::new(1)) {
                        Some(next) if next <= last => RunState::Processing(next),
                        _ => RunState::CaughtUp,
                    }
                }

                RunState::CaughtUp => return Ok(()),
            };
        }
    }

    async fn process_day(
        &self,
        day: NaiveDate,
        specs: &[&ReportSpec],
        checkpoint: &Checkpoint,
    ) -> std::result::Result<DayReport, (DayReport, IngestError)> {
        let mut report = DayReport {
            date: day,
            ..Default::default()
        };

        let (active, covered): (Vec<&ReportSpec>, Vec<&ReportSpec>) = specs
            .iter()
            .copied()
            .partition(|s| !(self.resolver.policy() == CheckpointPolicy::Lowest && checkpoint.covers(&s.name, day)));
        report.skipped = covered.iter().map(|s| s.name.clone()).collect();

        let names: Vec<String> = active.iter().map(|s| s.name.clone()).collect();
        let tasks = self.planner.plan(day, &self.agents, &active);
        tracing::debug!(day = %day, tasks = tasks.len(), skipped = report.skipped.len(), "Planned day");

        let mut aggregator = DayAggregator::new(day, &names);
        for task in &tasks {
            let Some(spec) = active.iter().find(|s| s.name == task.report_type) else {
                continue;
            };

            let outcome = self.scraper.scrape(task, spec).await;
            report.tasks += 1;
            if outcome.fault().is_some() {
                report.task_faults += 1;
            }
            report.records_scraped += outcome.records.len();
            aggregator.add(&outcome.report_type, outcome.records);
        }

        let batch = aggregator.finish();
        for (report_type, records) in batch.non_empty() {
            match self.merger.merge_append(&self.datasets, report_type, records).await {
                Ok(outcome) => {
                    report.written.insert(report_type.to_string(), outcome);
                }
                Err(err) => return Err((report, err)),
            }
        }

        tracing::info!(
            day = %day,
            tasks = report.tasks,
            task_faults = report.task_faults,
            rows = report.rows_written(),
            "Day committed"
        );
        Ok(report)
    }
}
