use outscan_scanner::ScanError;
use thiserror::Error;

/// Errors a run can die with. Only configuration problems and an
/// unresolvable root sitemap are fatal; everything recoverable travels as a
/// `ScanIssue` inside the scan result instead.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not read {path}: {source}")]
    ConfigIo {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    ConfigYaml {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("Could not compile allowlist pattern `{pattern}`: {source}")]
    BadPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CheckError>;
