//! End-to-end runs over the fixture browser and the in-memory store.

use chrono::NaiveDate;
use tokio_test::assert_ok;

use report_ingest::pipeline::{DatasetMerger, Orchestrator, QueryPlanner, RunOptions, TimeSlots};
use report_ingest::testing::{fast_settings, report_page, CallRow, HtmlFixtureBrowser, MemoryStore};
use report_ingest::types::CAPTURE_DATE_COLUMN;
use report_ingest::{
    default_catalog, Agent, CheckpointPolicy, CheckpointResolver, Datasets, FieldValue,
    IngestError, PageLayout, PageScraper, ReportRecord, UnreadablePolicy,
};

const BASE_URL: &str = "https://app.test";

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
}

fn roster() -> Vec<Agent> {
    vec![Agent::new("Nguyễn Việt Anh", "agrzhrqfkqrxgjegkm")]
}

fn planner() -> QueryPlanner {
    QueryPlanner::new(BASE_URL, TimeSlots::default())
}

/// URL the planner produces for one report type on one day.
fn url_of(report_type: &str, on: NaiveDate) -> String {
    let catalog = default_catalog();
    let spec = catalog.spec(report_type).unwrap();
    planner().plan(on, &roster(), &[spec]).remove(0).url
}

fn call_page(phones: &[&str]) -> String {
    let rows: Vec<String> = phones
        .iter()
        .map(|p| CallRow::new(*p, "2 phút", "10:00").html())
        .collect();
    report_page(phones.len() + 2, &rows, false)
}

fn orchestrator(
    browser: HtmlFixtureBrowser,
    store: MemoryStore,
    policy: CheckpointPolicy,
) -> Orchestrator<HtmlFixtureBrowser, MemoryStore> {
    Orchestrator::new(
        default_catalog(),
        roster(),
        planner(),
        PageScraper::new(browser, PageLayout::default(), fast_settings()),
        Datasets::new(store),
        CheckpointResolver::new(policy, day(2)),
        DatasetMerger::new(UnreadablePolicy::Replace),
    )
}

fn pipelines(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn only_non_empty_batches_are_merged() {
    let browser = HtmlFixtureBrowser::new()
        .with_route(url_of("Call_Den_Trong_Gio", day(2)), vec![call_page(&["0901", "0902", "0903"])]);
    let orchestrator = orchestrator(browser, MemoryStore::new(), CheckpointPolicy::FirstAvailable);

    let report = assert_ok!(orchestrator.run(&pipelines(&["calls"]), &RunOptions::new(day(3))).await);

    assert!(!report.is_aborted());
    assert_eq!(report.pipelines.len(), 1);
    let days = &report.pipelines[0].days;
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].date, day(2));
    assert_eq!(days[0].tasks, 4);
    assert_eq!(days[0].task_faults, 0);
    assert_eq!(days[0].written.len(), 1);
    assert_eq!(days[0].written["Call_Den_Trong_Gio"].appended, 3);

    let store = orchestrator.datasets().store();
    assert_eq!(store.write_count(), 1);
    assert_eq!(store.object_count(), 1);

    let stored = orchestrator.datasets().load("Call_Den_Trong_Gio").await.unwrap();
    assert_eq!(stored.len(), 3);
    assert!(stored.records.iter().all(|r| r.capture_date() == Some(day(2))));
    assert_eq!(stored.records[0].system_agent(), "Nguyễn Việt Anh");
}

#[tokio::test]
async fn caught_up_run_does_nothing() {
    let browser = HtmlFixtureBrowser::new()
        .with_route(url_of("Call_Den_Trong_Gio", day(2)), vec![call_page(&["0901"])]);
    let orchestrator = orchestrator(browser, MemoryStore::new(), CheckpointPolicy::FirstAvailable);
    let calls = pipelines(&["calls"]);

    orchestrator.run(&calls, &RunOptions::new(day(3))).await.unwrap();
    let navigations = orchestrator.scraper().driver().navigations().len();
    let writes = orchestrator.datasets().store().write_count();

    let report = orchestrator.run(&calls, &RunOptions::new(day(3))).await.unwrap();

    assert!(!report.is_aborted());
    assert_eq!(report.pipelines[0].checkpoint.next_day, day(3));
    assert!(report.pipelines[0].days.is_empty());
    assert_eq!(report.rows_written(), 0);
    assert_eq!(orchestrator.scraper().driver().navigations().len(), navigations);
    assert_eq!(orchestrator.datasets().store().write_count(), writes);
}

#[tokio::test]
async fn from_date_processes_each_day_in_order() {
    let browser =
        HtmlFixtureBrowser::new().with_route("call-list", vec![call_page(&["0901", "0902"])]);
    let orchestrator = orchestrator(browser, MemoryStore::new(), CheckpointPolicy::FirstAvailable);

    let options = RunOptions {
        from: Some(day(1)),
        until: None,
        today: day(3),
    };
    let report = orchestrator.run(&pipelines(&["calls"]), &options).await.unwrap();

    let dates: Vec<_> = report.pipelines[0].days.iter().map(|d| d.date).collect();
    assert_eq!(dates, vec![day(1), day(2)]);
    assert_eq!(report.rows_written(), 16);

    let store = orchestrator.datasets().store();
    assert_eq!(store.create_count(), 4);
    assert_eq!(store.update_count(), 4);

    let stored = orchestrator.datasets().load("Call_Di_Ngoai_Gio").await.unwrap();
    let captured: Vec<_> = stored.records.iter().map(|r| r.capture_date()).collect();
    assert_eq!(
        captured,
        vec![Some(day(1)), Some(day(1)), Some(day(2)), Some(day(2))]
    );
}

#[tokio::test]
async fn until_caps_the_last_day() {
    let orchestrator = orchestrator(HtmlFixtureBrowser::new(), MemoryStore::new(), CheckpointPolicy::FirstAvailable);
    let options = RunOptions {
        from: Some(day(1)),
        until: Some(day(1)),
        today: day(10),
    };

    let report = orchestrator.run(&pipelines(&["missed"]), &options).await.unwrap();
    let dates: Vec<_> = report.pipelines[0].days.iter().map(|d| d.date).collect();
    assert_eq!(dates, vec![day(1)]);
}

#[tokio::test]
async fn task_faults_do_not_stop_the_day() {
    let browser = HtmlFixtureBrowser::new()
        .with_failing_route("convo-list")
        .with_route("call-list", vec![call_page(&["0901", "0902"])]);
    let orchestrator = orchestrator(browser, MemoryStore::new(), CheckpointPolicy::FirstAvailable);

    let report = orchestrator
        .run(&pipelines(&["missed"]), &RunOptions::new(day(3)))
        .await
        .unwrap();

    assert!(!report.is_aborted());
    let day_report = &report.pipelines[0].days[0];
    assert_eq!(day_report.tasks, 3);
    assert_eq!(day_report.task_faults, 2);
    assert_eq!(day_report.written.keys().collect::<Vec<_>>(), vec!["Miss_Call"]);

    let stored = orchestrator.datasets().load("Miss_Call").await.unwrap();
    assert_eq!(stored.records[0].system_agent(), "N/A");
    assert_eq!(stored.records[0].text("Loại báo cáo"), "Miss_Call");
}

#[tokio::test]
async fn offline_store_aborts_the_run() {
    let store = MemoryStore::new();
    store.set_offline(true);
    let browser = HtmlFixtureBrowser::new().with_route("call-list", vec![call_page(&["0901"])]);
    let orchestrator = orchestrator(browser, store, CheckpointPolicy::FirstAvailable);

    let report = assert_ok!(orchestrator.run(&[], &RunOptions::new(day(3))).await);

    assert!(matches!(report.aborted, Some(IngestError::Store(_))));
    assert!(report.pipelines.is_empty());
    assert!(orchestrator.scraper().driver().navigations().is_empty());
}

#[tokio::test]
async fn unknown_pipeline_is_rejected() {
    let orchestrator = orchestrator(HtmlFixtureBrowser::new(), MemoryStore::new(), CheckpointPolicy::FirstAvailable);
    let result = orchestrator
        .run(&pipelines(&["calls", "sms"]), &RunOptions::new(day(3)))
        .await;
    assert!(matches!(result, Err(IngestError::UnknownPipeline(name)) if name == "sms"));
}

#[tokio::test]
async fn lowest_policy_skips_datasets_already_past_the_day() {
    let browser = HtmlFixtureBrowser::new().with_route("call-list", vec![call_page(&["0901"])]);
    let orchestrator = orchestrator(browser, MemoryStore::new(), CheckpointPolicy::Lowest);

    let seeded = |name: &str, on: NaiveDate| {
        vec![ReportRecord::new(name)
            .with("Khách hàng", "Khách A")
            .with(CAPTURE_DATE_COLUMN, FieldValue::Date(on))]
    };
    let datasets = orchestrator.datasets();
    datasets.save("Miss_Hoi_Thoai", None, &seeded("Miss_Hoi_Thoai", day(1))).await.unwrap();
    datasets.save("Miss_Call", None, &seeded("Miss_Call", day(2))).await.unwrap();

    let report = orchestrator
        .run(&pipelines(&["missed"]), &RunOptions::new(day(3)))
        .await
        .unwrap();

    let pipeline = &report.pipelines[0];
    assert_eq!(pipeline.checkpoint.next_day, day(2));
    assert_eq!(pipeline.checkpoint.source.as_deref(), Some("Miss_Hoi_Thoai"));
    assert_eq!(pipeline.days[0].skipped, vec!["Miss_Call"]);
    assert_eq!(pipeline.days[0].tasks, 2);
    assert!(orchestrator
        .scraper()
        .driver()
        .navigations()
        .iter()
        .all(|url| !url.contains("call-list")));
}
