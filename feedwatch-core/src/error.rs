use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected status code {0}")]
    Status(u16),
    #[error("feed parsing error: {0}")]
    Parse(#[from] rss::Error),
    #[error("atom parsing error: {0}")]
    Atom(#[from] atom_syndication::Error),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid notification url: {0}")]
    Url(#[from] url::ParseError),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("notification server answered {0}")]
    Status(u16),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no data directory available on this platform")]
    NoDataDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}
