use std::time::Duration;
use thiserror::Error;

/// Outcome of a single crawl stage that did not go to plan.
///
/// The session driver decides per variant and per stage whether the crawl
/// aborts or carries on with what the page currently shows.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: &'static str, waited: Duration },

    #[error("{0} not found on page")]
    Missing(&'static str),

    #[error("script `{script}` returned an unusable value: {value}")]
    ScriptResult { script: String, value: String },

    #[error("invalid selector `{0}`")]
    InvalidSelector(String),

    #[error("{0} is not supported by this page session")]
    Unsupported(&'static str),

    #[error("browser error: {0}")]
    Browser(#[from] anyhow::Error),
}

impl CrawlError {
    pub fn timeout(what: &'static str, waited: Duration) -> Self {
        Self::Timeout { what, waited }
    }
}

/// Required settings absent from the environment
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to parse state file: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("failed to serialize state: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to write state file: {0}")]
    Write(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("notification endpoint answered {0}")]
    Status(reqwest::StatusCode),

    #[error("notifications disabled: {0}")]
    Unavailable(String),
}
