use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} for {url}")]
    BadStatus { url: String, status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Not a sitemap document at {url}: {reason}")]
    SitemapParse { url: String, reason: String },

    #[error("Sitemap nesting exceeded {limit} levels below {url}")]
    SitemapDepth { url: String, limit: usize },

    #[error("Invalid batch spec `{0}`: expected {{number}}/{{total}} or {{number}}:{{total}}")]
    InvalidBatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;
