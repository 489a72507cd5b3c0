pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod history;
pub mod ledger;
pub mod matcher;
pub mod notify;
pub mod scanner;
pub mod scheduler;
pub mod status;

pub use config::{shared_config, SharedConfig};
pub use config::{AppConfig, FeedConfig, NotificationSettings, Priority};
pub use engine::FeedEngine;
pub use error::{ConfigError, NotifyError, ScanError, StoreError};
pub use feed::{FeedEntry, FeedItem};
pub use history::{FeedHistoryEntry, HistoryLog, HISTORY_CAPACITY};
pub use ledger::{LedgerRecord, PostLedger, PostLedgerEntry, LEDGER_FILE};
pub use notify::{Notification, Notifier};
pub use scanner::Scanner;
pub use scheduler::Scheduler;
pub use status::{FeedStatus, StatusBoard};
