//! Error types for the harness

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("No free port found at or above {preferred}")]
    PortSpaceExhausted { preferred: u16 },

    #[error("Root directory not found or not a directory: {0}")]
    InvalidRoot(PathBuf),

    #[error("HTTP error: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("GET {url} returned {status}")]
    FetchStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Malformed results: {0}")]
    MalformedResults(String),

    #[error("Teardown error: {0}")]
    Teardown(String),

    #[error("Missing fixture(s): {}", format_paths(.0))]
    MissingFixture(Vec<PathBuf>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    /// Whether a fetch failed because the timeout expired
    pub fn is_timeout(&self) -> bool {
        matches!(self, HarnessError::Fetch(e) if e.is_timeout())
    }
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type HarnessResult<T> = Result<T, HarnessError>;
