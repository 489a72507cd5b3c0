use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::scanner::Scanner;

/// Period between two scheduled checks.
pub fn check_period(config: &AppConfig) -> Duration {
    Duration::from_secs(config.effective_interval_minutes() * 60)
}

struct TimerHandle {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl TimerHandle {
    async fn stop(self) {
        let _ = self.cancel_tx.send(());
        if let Err(err) = self.join.await {
            warn!(error = %err, "scheduler task failed");
        }
    }
}

/// Owns the repeating timer that triggers [`Scanner::scan_all`].
pub struct Scheduler {
    scanner: Scanner,
    timer: Mutex<Option<TimerHandle>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn new(scanner: Scanner) -> Self {
        Self {
            scanner,
            timer: Mutex::new(None),
        }
    }

    pub async fn start(&self) {
        self.reconfigure().await;
    }

    /// Cancels the running timer, reconciles feed statuses with the current
    /// configuration and arms a new timer with the configured period.
    pub async fn reconfigure(&self) {
        let (period, urls) = {
            let config = self.scanner.config().read().await;
            let urls: Vec<String> = config.feeds.iter().map(|feed| feed.url.clone()).collect();
            (check_period(&config), urls)
        };
        self.scanner
            .status()
            .reconcile(urls.iter().map(String::as_str))
            .await;

        let mut timer = self.timer.lock().await;
        if let Some(previous) = timer.take() {
            previous.stop().await;
        }
        *timer = Some(spawn_timer(self.scanner.clone(), period));
        info!(period_secs = period.as_secs(), feeds = urls.len(), "scheduler armed");
    }

    /// Cancels the timer. Scans already started run to completion.
    pub async fn stop(&self) {
        if let Some(timer) = self.timer.lock().await.take() {
            timer.stop().await;
            info!("scheduler stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.timer.lock().await.is_some()
    }
}

fn spawn_timer(scanner: Scanner, period: Duration) -> TimerHandle {
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    info!("scheduler shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    // The timer only kicks off the check; it never waits on it.
                    let scanner = scanner.clone();
                    tokio::spawn(async move { scanner.scan_all().await });
                }
            }
        }
    });

    TimerHandle { cancel_tx, join }
}
