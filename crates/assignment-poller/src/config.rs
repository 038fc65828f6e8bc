use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the snapshot, activities and submitted-cache files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// How often to run a sync cycle (seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Messages fetched by the change-detection probe
    #[serde(default = "default_probe_count")]
    pub probe_count: u32,

    /// Result cap for a full mailbox fetch
    #[serde(default = "default_max_fetch")]
    pub max_fetch: u32,

    /// Attempts for a single message detail fetch
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,

    /// Fixed delay between fetch attempts (seconds)
    #[serde(default = "default_fetch_retry_delay")]
    pub fetch_retry_delay_secs: u64,

    /// Year assumed when parsing "Jan 5"-style due dates. Assignments posted
    /// across a year rollover will be mis-dated until this is updated.
    #[serde(default = "default_assumed_due_year")]
    pub assumed_due_year: i32,

    /// Header criteria a message must match to be treated as an
    /// assignment notification
    #[serde(default)]
    pub filter: FilterCriteria,

    #[serde(default)]
    pub gmail: GmailConfig,

    pub notion: NotionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Substring the From header must contain (case-insensitive)
    #[serde(default = "default_from_contains")]
    pub from_contains: String,

    /// Substring the Subject header must contain (case-insensitive)
    #[serde(default = "default_subject_contains")]
    pub subject_contains: String,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            from_contains: default_from_contains(),
            subject_contains: default_subject_contains(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmailConfig {
    /// Path to the OAuth client credentials JSON file
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,

    /// Path to store the OAuth token cache
    #[serde(default = "default_token_cache_path")]
    pub token_cache_path: PathBuf,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            token_cache_path: default_token_cache_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    /// Database that new task pages are created in
    pub tasks_database_id: String,

    /// Database the bootstrap derives activities from
    pub activities_database_id: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_poll_interval() -> u64 {
    300 // 5 minutes
}

fn default_probe_count() -> u32 {
    5
}

fn default_max_fetch() -> u32 {
    100
}

fn default_fetch_retries() -> u32 {
    3
}

fn default_fetch_retry_delay() -> u64 {
    5
}

fn default_assumed_due_year() -> i32 {
    2024
}

fn default_from_contains() -> String {
    "no-reply@classroom.google.com".to_string()
}

fn default_subject_contains() -> String {
    "New assignment".to_string()
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_token_cache_path() -> PathBuf {
    PathBuf::from("gmail_token_cache.json")
}

impl Config {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("snapshot.json")
    }

    pub fn activities_path(&self) -> PathBuf {
        self.data_dir.join("activities.json")
    }

    pub fn submitted_path(&self) -> PathBuf {
        self.data_dir.join("submitted.json")
    }
}
