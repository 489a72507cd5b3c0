use std::collections::HashSet;

use bytes::Bytes;
use chrono::Utc;
use futures_util::future::join_all;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::{FeedConfig, SharedConfig};
use crate::error::ScanError;
use crate::feed::{parse_entries, FeedEntry};
use crate::history::{FeedHistoryEntry, HistoryLog};
use crate::ledger::PostLedger;
use crate::matcher::matched_keywords;
use crate::notify::{render, Notifier};
use crate::status::{FeedStatus, StatusBoard};

/// Runs the fetch, match, notify and record pipeline for configured feeds.
#[derive(Debug, Clone)]
pub struct Scanner {
    config: SharedConfig,
    client: Client,
    notifier: Notifier,
    ledger: PostLedger,
    history: HistoryLog,
    status: StatusBoard,
}

impl Scanner {
    pub fn new(
        config: SharedConfig,
        client: Client,
        ledger: PostLedger,
        history: HistoryLog,
        status: StatusBoard,
    ) -> Self {
        Self {
            notifier: Notifier::new(client.clone()),
            config,
            client,
            ledger,
            history,
            status,
        }
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn ledger(&self) -> &PostLedger {
        &self.ledger
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    /// Scans every configured feed concurrently and waits for all of them.
    pub async fn scan_all(&self) {
        let feeds = self.config.read().await.feeds.clone();
        info!(feeds = feeds.len(), "checking feeds");
        join_all(feeds.iter().map(|feed| self.scan_one(feed))).await;
        debug!("feed check complete");
    }

    /// Scans one feed. Failures end up in the feed's status, never in the caller.
    pub async fn scan_one(&self, feed: &FeedConfig) {
        let url = feed.url.as_str();
        if !self
            .status
            .update_if_present(
                url,
                FeedStatus {
                    last_check: Utc::now(),
                    is_checking: true,
                    error: None,
                },
            )
            .await
        {
            debug!(feed = %url, "feed no longer tracked; scanning without status");
        }

        let entries = match fetch_feed(&self.client, url).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(feed = %url, error = %err, "failed to check feed");
                self.status
                    .update_if_present(
                        url,
                        FeedStatus {
                            last_check: Utc::now(),
                            is_checking: false,
                            error: Some(err.to_string()),
                        },
                    )
                    .await;
                return;
            }
        };

        let candidates = self.unseen(entries).await;
        let (server_address, default_topic) = {
            let config = self.config.read().await;
            (config.ntfy_server_address.clone(), config.ntfy_topic.clone())
        };

        let checked_at = Utc::now();
        let mut notified = 0usize;
        let mut evaluated = Vec::with_capacity(candidates.len());
        for entry in candidates {
            let matched = matched_keywords(&entry.searchable_text(), &feed.keywords);
            if !matched.is_empty() {
                let item = entry.to_item();
                let notification = render(
                    &item,
                    &matched,
                    &feed.notification_settings,
                    &server_address,
                    &default_topic,
                );
                if let Err(err) = self.notifier.dispatch(&notification).await {
                    warn!(feed = %url, title = %notification.title, error = %err, "failed to send notification");
                }
                self.history
                    .append(FeedHistoryEntry {
                        item,
                        feed_url: url.to_owned(),
                        checked_at,
                        notification_sent: true,
                        matched_keywords: matched.clone(),
                    })
                    .await;
                notified += 1;
            }
            evaluated.push((entry, matched));
        }

        for (entry, matched) in evaluated {
            // Entries without a GUID cannot be deduplicated and are evaluated again next scan.
            let Some(guid) = entry.guid.as_deref() else {
                continue;
            };
            let sent = !matched.is_empty();
            self.ledger
                .record_checked(guid, url, &entry.title, &entry.link, matched, sent)
                .await;
        }

        info!(feed = %url, notified, "feed checked");
        self.status
            .update_if_present(
                url,
                FeedStatus {
                    last_check: Utc::now(),
                    is_checking: false,
                    error: None,
                },
            )
            .await;
    }

    /// Entries not yet in the ledger, keeping the first of any repeated GUID.
    async fn unseen(&self, entries: Vec<FeedEntry>) -> Vec<FeedEntry> {
        let mut in_payload = HashSet::new();
        let mut candidates = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(guid) = entry.guid.as_deref() {
                if !in_payload.insert(guid.to_owned()) || self.ledger.is_checked(guid).await {
                    debug!(%guid, "skipping already seen post");
                    continue;
                }
            }
            candidates.push(entry);
        }
        candidates
    }
}

pub async fn fetch_feed(client: &Client, url: &str) -> Result<Vec<FeedEntry>, ScanError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ScanError::Status(status.as_u16()));
    }
    let body: Bytes = response.bytes().await?;
    parse_entries(&body)
}
