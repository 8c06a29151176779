//! Error types for the tracker.
//!
//! `Network` aborts a run. `Parse` covers a single bad record (from the
//! endpoint or from the history file) and is normally logged and skipped by
//! the caller rather than propagated.

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// The search request failed, timed out, or returned something other than JSON.
    #[error("network error: {0}")]
    Network(String),

    /// A single record could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid static configuration.
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

impl From<reqwest::Error> for TrackerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TrackerError::Network(format!("request timed out: {e}"))
        } else {
            TrackerError::Network(e.to_string())
        }
    }
}
