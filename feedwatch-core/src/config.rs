use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::ConfigError;

/// Environment variable overriding the directory that holds `config.json`
/// and the ledger document.
pub const DATA_DIR_ENV: &str = "RSS_WATCHER_DATA_DIR";

const DEFAULT_CHECK_INTERVAL_MINUTES: u64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub feeds: Vec<FeedConfig>,
    pub ntfy_topic: String,
    pub ntfy_server_address: String,
    pub check_interval_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedConfig {
    pub url: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub notification_settings: NotificationSettings,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    High,
    #[default]
    Default,
    Low,
    Min,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::High => "high",
            Self::Default => "default",
            Self::Low => "low",
            Self::Min => "min",
        }
    }
}

/// Per-feed rendering rules. Every field has a default so partially written
/// settings still render.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub use_post_title: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_title: Option<String>,
    pub use_post_description: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_description: Option<String>,
    pub append_link: bool,
    pub priority: Priority,
    pub include_keyword_tags: bool,
    pub include_open_action: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ntfy_topic: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            ntfy_topic: String::new(),
            ntfy_server_address: String::new(),
            check_interval_minutes: DEFAULT_CHECK_INTERVAL_MINUTES,
        }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            use_post_title: true,
            custom_title: None,
            use_post_description: true,
            custom_description: None,
            append_link: true,
            priority: Priority::Default,
            include_keyword_tags: true,
            include_open_action: true,
            ntfy_topic: None,
        }
    }
}

impl FeedConfig {
    pub fn new(url: impl Into<String>, keywords: Vec<String>) -> Self {
        Self {
            url: url.into(),
            keywords,
            notification_settings: NotificationSettings::default(),
        }
    }
}

impl AppConfig {
    /// Resolves the data directory: `RSS_WATCHER_DATA_DIR` when set, otherwise
    /// `<platform data dir>/feedwatch`.
    pub fn data_dir() -> Result<PathBuf, ConfigError> {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        let base = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
        Ok(base.join("feedwatch"))
    }

    /// Loads the configuration, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::read_file(path) {
            Ok(config) => config,
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to load configuration, using defaults");
                Self::default()
            }
        }
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Scheduler period in minutes, never below one.
    pub fn effective_interval_minutes(&self) -> u64 {
        self.check_interval_minutes.max(1)
    }
}

pub type SharedConfig = Arc<RwLock<AppConfig>>;

pub fn shared_config(initial: AppConfig) -> SharedConfig {
    Arc::new(RwLock::new(initial))
}
