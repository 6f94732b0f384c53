use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use dotenvy::dotenv;
use serde::Deserialize;
use url::Url;

use crate::dataset::UnreadablePolicy;
use crate::pipeline::checkpoint::CheckpointPolicy;
use crate::pipeline::planner::TimeSlots;
use crate::pipeline::scrape::ScraperSettings;
use crate::types::Agent;

/// Where datasets are stored.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    Drive {
        folder_id: String,
        access_token: String,
    },
    Local {
        dir: PathBuf,
    },
}

/// Deployment configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub debugger_url: String,
    pub store: StoreBackend,
    pub settings_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let store = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "drive".to_string())
            .as_str()
        {
            "drive" => StoreBackend::Drive {
                folder_id: env::var("DRIVE_FOLDER_ID").context("DRIVE_FOLDER_ID must be set")?,
                access_token: env::var("DRIVE_ACCESS_TOKEN")
                    .context("DRIVE_ACCESS_TOKEN must be set")?,
            },
            "local" => StoreBackend::Local {
                dir: env::var("LOCAL_STORE_DIR")
                    .unwrap_or_else(|_| "./datasets".to_string())
                    .into(),
            },
            other => bail!("STORE_BACKEND must be 'drive' or 'local', got '{}'", other),
        };

        let base_url = env::var("REPORT_BASE_URL")
            .unwrap_or_else(|_| "https://app.subiz.com.vn".to_string());
        Url::parse(&base_url)
            .with_context(|| format!("REPORT_BASE_URL is not a valid URL: {}", base_url))?;

        Ok(Self {
            base_url,
            debugger_url: env::var("BROWSER_DEBUGGER_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:9222".to_string()),
            store,
            settings_path: env::var("INGEST_SETTINGS")
                .unwrap_or_else(|_| "ingest.toml".to_string())
                .into(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckpointSettings {
    pub policy: CheckpointPolicy,
    /// Used when no dataset carries a capture date
    pub default_start: NaiveDate,
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self {
            policy: CheckpointPolicy::default(),
            default_start: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or_default(),
        }
    }
}

/// Run settings from the TOML settings file. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub agents: Vec<Agent>,
    pub checkpoint: CheckpointSettings,
    pub time_slots: TimeSlots,
    pub scraper: ScraperSettings,
    pub unreadable: UnreadablePolicy,
}

impl IngestSettings {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid ingest settings")
    }

    /// Load settings from a file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Settings file not found, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("In {}", path.display()))
    }
}
