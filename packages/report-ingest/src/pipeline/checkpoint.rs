//! Next-day resolution from stored datasets.

use chrono::{Days, NaiveDate};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::dataset::Datasets;
use crate::error::Result;
use crate::traits::DatasetStore;

/// How candidate datasets are combined into one checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointPolicy {
    /// The first candidate with a capture date decides
    #[default]
    FirstAvailable,
    /// The least advanced candidate decides; datasets already past a day are
    /// skipped when that day is merged
    Lowest,
}

/// Resolved starting point for a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub next_day: NaiveDate,
    /// Dataset that determined `next_day`; `None` when the default applied
    pub source: Option<String>,
    /// Last capture date of every candidate inspected that had one
    pub coverage: IndexMap<String, NaiveDate>,
}

impl Checkpoint {
    /// Whether `dataset` already holds rows for `day`.
    pub fn covers(&self, dataset: &str, day: NaiveDate) -> bool {
        self.coverage.get(dataset).is_some_and(|last| *last >= day)
    }
}

pub struct CheckpointResolver {
    policy: CheckpointPolicy,
    default_start: NaiveDate,
}

impl CheckpointResolver {
    pub fn new(policy: CheckpointPolicy, default_start: NaiveDate) -> Self {
        Self {
            policy,
            default_start,
        }
    }

    pub fn policy(&self) -> CheckpointPolicy {
        self.policy
    }

    /// Resolve the next unprocessed day from `candidates`, in priority order.
    ///
    /// Candidates that are missing, empty, unreadable or carry no parseable
    /// capture date are passed over. Store faults propagate.
    pub async fn resolve<S: DatasetStore>(
        &self,
        datasets: &Datasets<S>,
        candidates: &[String],
    ) -> Result<Checkpoint> {
        let mut coverage = IndexMap::new();

        for name in candidates {
            let dataset = datasets.load(name).await?;
            let last = dataset.records.iter().filter_map(|r| r.capture_date()).max();

            let Some(last) = last else {
                tracing::debug!(dataset = %name, rows = dataset.len(), "No capture date in candidate");
                continue;
            };

            coverage.insert(name.clone(), last);
            if self.policy == CheckpointPolicy::FirstAvailable {
                break;
            }
        }

        let decided = match self.policy {
            CheckpointPolicy::FirstAvailable => coverage.first(),
            CheckpointPolicy::Lowest => coverage.iter().min_by_key(|(_, last)| **last),
        }
        .map(|(name, last)| (name.clone(), *last));

        let checkpoint = match decided {
            Some((name, last)) => Checkpoint {
                next_day: last.checked_add_days(Days::new(1)).unwrap_or(last),
                source: Some(name),
                coverage,
            },
            None => Checkpoint {
                next_day: self.default_start,
                source: None,
                coverage,
            },
        };

        tracing::info!(
            next_day = %checkpoint.next_day,
            source = checkpoint.source.as_deref().unwrap_or("default"),
            policy = ?self.policy,
            "Resolved checkpoint"
        );
        Ok(checkpoint)
    }
}
