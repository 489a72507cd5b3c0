use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use tracing::info;

use crate::config::{shared_config, AppConfig, NotificationSettings};
use crate::error::NotifyError;
use crate::history::{FeedHistoryEntry, HistoryLog};
use crate::ledger::{LedgerRecord, PostLedger};
use crate::notify::{render, test_item};
use crate::scanner::Scanner;
use crate::scheduler::Scheduler;
use crate::status::{FeedStatus, StatusBoard};

/// Entry point for collaborators: owns the scanner state and the scheduler.
#[derive(Debug, Clone)]
pub struct FeedEngine {
    scanner: Scanner,
    scheduler: Arc<Scheduler>,
}

impl FeedEngine {
    pub fn new(config: AppConfig, client: Client, ledger: PostLedger) -> Self {
        let status = StatusBoard::with_feeds(config.feeds.iter().map(|feed| feed.url.as_str()));
        let scanner = Scanner::new(
            shared_config(config),
            client,
            ledger,
            HistoryLog::new(),
            status,
        );
        Self {
            scheduler: Arc::new(Scheduler::new(scanner.clone())),
            scanner,
        }
    }

    pub async fn start(&self) {
        self.scheduler.start().await;
    }

    pub async fn reconfigure(&self) {
        self.scheduler.reconfigure().await;
    }

    /// Replaces the configuration snapshot and re-arms the scheduler.
    pub async fn apply_config(&self, config: AppConfig) {
        *self.scanner.config().write().await = config;
        self.reconfigure().await;
    }

    pub async fn config(&self) -> AppConfig {
        self.scanner.config().read().await.clone()
    }

    /// Checks every feed now, independently of the timer.
    pub async fn scan_all(&self) {
        self.scanner.scan_all().await;
    }

    pub async fn status(&self) -> HashMap<String, FeedStatus> {
        self.scanner.status().snapshot().await
    }

    pub async fn history(&self) -> Vec<FeedHistoryEntry> {
        self.scanner.history().snapshot().await
    }

    pub async fn ledger_entries(&self) -> Vec<LedgerRecord> {
        self.scanner.ledger().entries().await
    }

    /// Renders and sends a canned notification with default settings. The
    /// ledger and history are left untouched.
    ///
    /// Unlike dispatch during a scan, which only logs failures, gateway and
    /// URL errors are returned so the caller can report them.
    pub async fn send_test_notification(&self) -> Result<(), NotifyError> {
        let (server_address, topic) = {
            let config = self.scanner.config().read().await;
            (config.ntfy_server_address.clone(), config.ntfy_topic.clone())
        };
        let item = test_item(&server_address);
        let notification = render(
            &item,
            &["test".to_owned()],
            &NotificationSettings::default(),
            &server_address,
            &topic,
        );
        info!(target = %notification.target, "sending test notification");
        self.scanner.notifier().dispatch(&notification).await
    }

    pub async fn stop(&self) {
        self.scheduler.stop().await;
    }

    pub async fn is_scheduled(&self) -> bool {
        self.scheduler.is_running().await
    }
}
