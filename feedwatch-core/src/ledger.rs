use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::StoreError;

/// File name of the persisted ledger inside the data directory.
pub const LEDGER_FILE: &str = "history.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostLedgerEntry {
    pub feed_url: String,
    pub checked_at: DateTime<Utc>,
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
    pub notification_sent: bool,
}

/// A ledger entry together with the post identifier it is keyed by.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    pub guid: String,
    #[serde(flatten)]
    pub entry: PostLedgerEntry,
}

type LedgerData = HashMap<String, PostLedgerEntry>;

/// Durable map of post identifiers that have already been evaluated.
///
/// Every insert rewrites the whole document while the lock is held, so
/// concurrent scans never lose each other's records.
#[derive(Debug, Clone)]
pub struct PostLedger {
    inner: Arc<Mutex<LedgerData>>,
    path: Option<PathBuf>,
}

impl PostLedger {
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Mutex::new(LedgerData::default())),
            path: None,
        }
    }

    /// Loads the ledger at `path`. A corrupt document falls back to the
    /// temp file left by an interrupted write, then to an empty ledger.
    pub async fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<LedgerData>(&bytes) {
                Ok(data) => data,
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "failed to parse ledger, trying tmp fallback");
                    let tmp = path.with_extension("json.tmp");
                    match tokio::fs::read(&tmp).await {
                        Ok(tmp_bytes) => serde_json::from_slice(&tmp_bytes).unwrap_or_else(|e| {
                            warn!(error = %e, "tmp ledger unusable, starting empty");
                            LedgerData::default()
                        }),
                        Err(_) => LedgerData::default(),
                    }
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LedgerData::default(),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "failed to read ledger, starting empty");
                LedgerData::default()
            }
        };
        debug!(entries = data.len(), "ledger loaded");
        Self {
            inner: Arc::new(Mutex::new(data)),
            path: Some(path),
        }
    }

    pub async fn is_checked(&self, guid: &str) -> bool {
        self.inner.lock().await.contains_key(guid)
    }

    /// Records a first sighting. Existing entries are never replaced; returns
    /// `false` when `guid` was already present.
    pub async fn record_checked(
        &self,
        guid: &str,
        feed_url: &str,
        title: &str,
        link: &str,
        matched_keywords: Vec<String>,
        notification_sent: bool,
    ) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.contains_key(guid) {
            debug!(%guid, "post already recorded");
            return false;
        }
        inner.insert(
            guid.to_owned(),
            PostLedgerEntry {
                feed_url: feed_url.to_owned(),
                checked_at: Utc::now(),
                title: title.to_owned(),
                link: link.to_owned(),
                matched_keywords,
                notification_sent,
            },
        );
        if let Err(err) = self.persist(&inner).await {
            warn!(%err, "failed to persist ledger");
        }
        true
    }

    /// All entries, most recent sighting first.
    pub async fn entries(&self) -> Vec<LedgerRecord> {
        let inner = self.inner.lock().await;
        let mut records: Vec<LedgerRecord> = inner
            .iter()
            .map(|(guid, entry)| LedgerRecord {
                guid: guid.clone(),
                entry: entry.clone(),
            })
            .collect();
        records.sort_by(|a, b| b.entry.checked_at.cmp(&a.entry.checked_at));
        records
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    async fn persist(&self, data: &LedgerData) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            debug!("ledger is in-memory only; skipping persist");
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(data)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}
