//! Command-line entry point for report ingestion.
//!
//! `run` needs an authenticated Chrome listening on `BROWSER_DEBUGGER_URL`;
//! the other commands only read the dataset store.

use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drive_client::DriveClient;
use report_ingest::inventory::{inspect, inventory};
use report_ingest::stores::{DriveStore, LocalStore};
use report_ingest::{
    default_catalog, CheckpointResolver, Config, Datasets, DatasetStore, IngestSettings, RunReport,
    StoreBackend,
};

#[derive(Parser)]
#[command(name = "report-ingest")]
#[command(about = "Incremental ingestion of report tables into columnar datasets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape and merge every day from the checkpoint up to yesterday
    Run {
        /// Pipelines to run (all when omitted)
        #[arg(long = "pipeline")]
        pipelines: Vec<String>,
        /// Start at this day instead of the checkpoint
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Stop after this day
        #[arg(long)]
        until: Option<NaiveDate>,
    },

    /// Print the next day each pipeline would process
    Checkpoint {
        #[arg(long = "pipeline")]
        pipelines: Vec<String>,
    },

    /// Row counts per capture date and agent
    Inventory {
        #[arg(long = "pipeline")]
        pipelines: Vec<String>,
    },

    /// Rows stored for one day
    Inspect {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long = "pipeline")]
        pipelines: Vec<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,report_ingest=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let settings = IngestSettings::load(&config.settings_path)?;

    match config.store.clone() {
        StoreBackend::Drive {
            folder_id,
            access_token,
        } => {
            tracing::info!(folder_id = %folder_id, "Using Drive dataset store");
            let store = DriveStore::new(DriveClient::new(access_token, folder_id));
            execute(cli.command, &config, &settings, store).await
        }
        StoreBackend::Local { dir } => {
            tracing::info!(dir = %dir.display(), "Using local dataset store");
            execute(cli.command, &config, &settings, LocalStore::new(dir)).await
        }
    }
}

async fn execute<S: DatasetStore>(
    command: Commands,
    config: &Config,
    settings: &IngestSettings,
    store: S,
) -> Result<ExitCode> {
    let catalog = default_catalog();
    let datasets = Datasets::new(store);

    match command {
        Commands::Run {
            pipelines,
            from,
            until,
        } => {
            let report = run(config, settings, catalog, datasets, &pipelines, from, until).await?;
            print_run_report(&report);
            Ok(if report.is_aborted() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }

        Commands::Checkpoint { pipelines } => {
            let resolver = CheckpointResolver::new(
                settings.checkpoint.policy,
                settings.checkpoint.default_start,
            );
            for pipeline in catalog.select(&pipelines)? {
                let checkpoint = resolver.resolve(&datasets, &pipeline.report_types).await?;
                let source = checkpoint.source.as_deref().unwrap_or("default start");
                println!(
                    "{:<14} {}  {}",
                    pipeline.name.bold(),
                    checkpoint.next_day.to_string().green(),
                    format!("(from {})", source).dimmed()
                );
                for (dataset, last) in &checkpoint.coverage {
                    println!("    {:<24} last {}", dataset, last);
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Inventory { pipelines } => {
            let inventory = inventory(&datasets, &catalog, &pipelines).await?;

            print!("{:<12} {:<28}", "date".bold(), "agent".bold());
            for report_type in &inventory.report_types {
                print!(" {}", report_type.bold());
            }
            println!(" {:>8}", "total".bold());

            for row in &inventory.rows {
                let date = row.date.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
                print!("{:<12} {:<28}", date, row.agent);
                for (count, report_type) in row.counts.iter().zip(&inventory.report_types) {
                    print!(" {:>width$}", count, width = report_type.chars().count());
                }
                println!(" {:>8}", row.total().to_string().cyan());
            }

            for name in &inventory.unreadable {
                println!("{} {} could not be decoded", "warning:".yellow().bold(), name);
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Inspect {
            date,
            pipelines,
            limit,
        } => {
            for inspection in inspect(&datasets, &catalog, &pipelines, date, limit).await? {
                let status = if !inspection.exists {
                    "missing".dimmed()
                } else if inspection.unreadable {
                    "unreadable".red()
                } else {
                    "ok".green()
                };
                println!(
                    "{} [{}] {} rows on {} ({} total)",
                    inspection.name.bold(),
                    status,
                    inspection.rows_for_day,
                    date,
                    inspection.total_rows
                );

                if let Some(zero) = inspection.zero_duration.filter(|z| *z > 0) {
                    println!("  {} {} zero-length calls", "warning:".yellow().bold(), zero);
                }
                for record in &inspection.sample {
                    let fields: Vec<String> = record
                        .fields
                        .iter()
                        .map(|(column, value)| format!("{}={}", column, value))
                        .collect();
                    println!("  {}", fields.join(" | "));
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(feature = "browser")]
async fn run<S: DatasetStore>(
    config: &Config,
    settings: &IngestSettings,
    catalog: report_ingest::ReportCatalog,
    datasets: Datasets<S>,
    pipelines: &[String],
    from: Option<NaiveDate>,
    until: Option<NaiveDate>,
) -> Result<RunReport> {
    use report_ingest::browser::ChromeBrowser;
    use report_ingest::{
        DatasetMerger, Orchestrator, PageLayout, PageScraper, QueryPlanner, RunOptions,
    };

    let driver = ChromeBrowser::connect(&config.debugger_url)
        .await
        .context("Failed to attach to browser")?;

    let orchestrator = Orchestrator::new(
        catalog,
        settings.agents.clone(),
        QueryPlanner::new(config.base_url.clone(), settings.time_slots.clone()),
        PageScraper::new(driver, PageLayout::default(), settings.scraper.clone()),
        datasets,
        CheckpointResolver::new(settings.checkpoint.policy, settings.checkpoint.default_start),
        DatasetMerger::new(settings.unreadable),
    );

    let options = RunOptions {
        from,
        until,
        today: chrono::Local::now().date_naive(),
    };
    tracing::info!(agents = settings.agents.len(), last_day = %options.last_day(), "Starting run");
    Ok(orchestrator.run(pipelines, &options).await?)
}

#[cfg(not(feature = "browser"))]
async fn run<S: DatasetStore>(
    _config: &Config,
    _settings: &IngestSettings,
    _catalog: report_ingest::ReportCatalog,
    _datasets: Datasets<S>,
    _pipelines: &[String],
    _from: Option<NaiveDate>,
    _until: Option<NaiveDate>,
) -> Result<RunReport> {
    anyhow::bail!("report-ingest was built without the `browser` feature; `run` is unavailable")
}

fn print_run_report(report: &RunReport) {
    for pipeline in &report.pipelines {
        println!(
            "{} from {} (checkpoint {})",
            pipeline.pipeline.bold(),
            pipeline.start,
            pipeline.checkpoint.next_day
        );
        if pipeline.days.is_empty() {
            println!("  {}", "already caught up".dimmed());
        }

        for day in &pipeline.days {
            let faults = if day.task_faults > 0 {
                format!("{} faults", day.task_faults).yellow()
            } else {
                "no faults".normal()
            };
            println!(
                "  {}  {} tasks, {}, {} rows written",
                day.date.to_string().cyan(),
                day.tasks,
                faults,
                day.rows_written()
            );
            for (report_type, outcome) in &day.written {
                println!(
                    "    {:<24} +{:<6} → {}{}",
                    report_type,
                    outcome.appended,
                    outcome.total_rows,
                    if outcome.created { " (created)" } else { "" }
                );
            }
            if !day.skipped.is_empty() {
                println!("    {} {}", "skipped:".dimmed(), day.skipped.join(", "));
            }
        }
    }

    match &report.aborted {
        Some(err) => println!("{} {}", "Run aborted:".red().bold(), err),
        None => println!("{} {} rows written", "Done:".green().bold(), report.rows_written()),
    }
}
