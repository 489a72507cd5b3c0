use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use feedwatch_core::{AppConfig, ConfigError, FeedEngine, PostLedger, LEDGER_FILE};
use reqwest::{redirect, Client, ClientBuilder};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

enum Command {
    Run,
    Check,
    TestNotification,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let command = match std::env::args().nth(1).as_deref() {
        None | Some("run") => Command::Run,
        Some("check") => Command::Check,
        Some("test-notification") => Command::TestNotification,
        Some(other) => {
            eprintln!("unknown command `{other}`; expected run, check or test-notification");
            return ExitCode::FAILURE;
        }
    };

    let data_dir = match AppConfig::data_dir() {
        Ok(dir) => dir,
        Err(err) => {
            error!(error = %err, "cannot resolve data directory");
            return ExitCode::FAILURE;
        }
    };

    let engine = match build_engine(&data_dir).await {
        Ok(engine) => engine,
        Err(err) => {
            error!(error = %err, "failed to start");
            return ExitCode::FAILURE;
        }
    };

    match command {
        Command::Run => run(engine).await,
        Command::Check => {
            engine.scan_all().await;
            for (url, status) in engine.status().await {
                match status.error {
                    Some(err) => info!(feed = %url, error = %err, "feed failed"),
                    None => info!(feed = %url, "feed ok"),
                }
            }
        }
        Command::TestNotification => {
            if let Err(err) = engine.send_test_notification().await {
                error!(error = %err, "test notification failed");
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

async fn build_engine(data_dir: &Path) -> Result<FeedEngine, ConfigError> {
    std::fs::create_dir_all(data_dir)?;
    let config = AppConfig::load_from(data_dir.join("config.json"));
    let ledger = PostLedger::load_from(data_dir.join(LEDGER_FILE)).await;
    info!(
        feeds = config.feeds.len(),
        data_dir = %data_dir.display(),
        "configuration loaded"
    );
    Ok(FeedEngine::new(config, build_client(), ledger))
}

fn build_client() -> Client {
    let builder = ClientBuilder::new()
        .redirect(redirect::Policy::limited(5))
        .user_agent(concat!("feedwatch/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30));
    builder.build().unwrap_or_else(|err| {
        error!(error = %err, "failed to build HTTP client, using defaults");
        Client::new()
    })
}

async fn run(engine: FeedEngine) {
    engine.start().await;
    info!("feedwatch running; press Ctrl-C to stop");
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }
    info!("shutting down");
    engine.stop().await;
}
