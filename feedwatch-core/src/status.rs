use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedStatus {
    /// Epoch zero means the feed was never checked.
    pub last_check: DateTime<Utc>,
    pub is_checking: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FeedStatus {
    pub fn never_checked() -> Self {
        Self {
            last_check: DateTime::<Utc>::default(),
            is_checking: false,
            error: None,
        }
    }

    pub fn has_been_checked(&self) -> bool {
        self.last_check != DateTime::<Utc>::default()
    }
}

/// Per-feed status keyed by feed URL.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<HashMap<String, FeedStatus>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Board with a never-checked status for each of `urls`.
    pub fn with_feeds<'a>(urls: impl IntoIterator<Item = &'a str>) -> Self {
        let statuses = urls
            .into_iter()
            .map(|url| (url.to_owned(), FeedStatus::never_checked()))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(statuses)),
        }
    }

    /// Replaces the status of a tracked feed. Feeds pruned by a config update
    /// stay pruned; returns `false` for them.
    pub async fn update_if_present(&self, url: &str, status: FeedStatus) -> bool {
        match self.inner.write().await.get_mut(url) {
            Some(slot) => {
                *slot = status;
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, url: &str) -> Option<FeedStatus> {
        self.inner.read().await.get(url).cloned()
    }

    pub async fn snapshot(&self) -> HashMap<String, FeedStatus> {
        self.inner.read().await.clone()
    }

    /// Drops statuses of feeds no longer configured and adds a never-checked
    /// status for new ones.
    pub async fn reconcile<'a>(&self, urls: impl IntoIterator<Item = &'a str>) {
        let configured: HashSet<&str> = urls.into_iter().collect();
        let mut inner = self.inner.write().await;
        inner.retain(|url, _| configured.contains(url.as_str()));
        for url in configured {
            inner
                .entry(url.to_owned())
                .or_insert_with(FeedStatus::never_checked);
        }
    }
}
