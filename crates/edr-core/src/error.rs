use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Failures of the portal login sequence. Any of these aborts the run.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Password rejected: {reason}")]
    PasswordRejected { reason: String },

    #[error("Could not request a one-time code: {reason}")]
    CodeRequestFailed { reason: String },

    #[error("One-time code was not accepted: {reason}")]
    CodeInvalid { reason: String },

    #[error("Could not extract bearer token: {reason}")]
    TokenExtractionFailed { reason: String },
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Not authenticated: log in or supply a token before fetching")]
    NotAuthenticated,

    #[error("Retrieval failed for {target}: {reason}")]
    RetrievalFailed { target: String, reason: String },

    #[error("Browse window starts {start}, after it ends {end}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Typesetting failed: {0}")]
    Typesetting(String),
}

#[derive(Error, Debug)]
pub enum PrintError {
    #[error(
        "All print mechanisms failed (tried: {}). Report was staged at {}",
        attempted_list(attempted),
        staged_at.display()
    )]
    AllMechanismsFailed {
        attempted: Vec<&'static str>,
        staged_at: PathBuf,
    },

    #[error("Could not stage report for printing: {0}")]
    Staging(#[from] std::io::Error),
}

fn attempted_list(attempted: &[&'static str]) -> String {
    if attempted.is_empty() {
        "none available".to_string()
    } else {
        attempted.join(", ")
    }
}

/// Why a single event in a batch did not make it through.
#[derive(Error, Debug)]
pub enum EventFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Could not save report: {0}")]
    Save(#[from] std::io::Error),

    #[error(transparent)]
    Print(#[from] PrintError),

    #[error("Consolidated report failed: {0}")]
    Consolidated(String),
}

/// Transport-level failure talking to the portal.
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Could not parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing setting: {setting} (set it in the config file or via {env_var})")]
    MissingSetting {
        setting: &'static str,
        env_var: &'static str,
    },
}
