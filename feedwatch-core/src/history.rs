use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::feed::FeedItem;

pub const HISTORY_CAPACITY: usize = 1000;

/// One notification-triggering match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedHistoryEntry {
    #[serde(flatten)]
    pub item: FeedItem,
    pub feed_url: String,
    pub checked_at: DateTime<Utc>,
    pub notification_sent: bool,
    pub matched_keywords: Vec<String>,
}

/// Bounded in-memory log of sent notifications, newest first.
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    inner: Arc<RwLock<VecDeque<FeedHistoryEntry>>>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, entry: FeedHistoryEntry) {
        let mut entries = self.inner.write().await;
        entries.push_front(entry);
        if entries.len() > HISTORY_CAPACITY {
            entries.pop_back();
        }
    }

    pub async fn snapshot(&self) -> Vec<FeedHistoryEntry> {
        self.inner.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
