use crate::error::{Result, ScanError};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Client;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const RETRY_LIMIT: usize = 3;
const RETRY_WAIT: Duration = Duration::from_secs(4);

/// Characters kept verbatim when a cached page URL becomes a filename.
/// Slashes are encoded-then-replaced separately so dumped files stay flat.
const CACHE_KEY_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'_')
    .remove(b'~');

pub struct PageFetcher {
    client: Client,
    cache: Arc<Mutex<HashMap<String, String>>>,
    retry_limit: usize,
    retry_wait: Duration,
}

impl PageFetcher {
    pub fn new(user_agent: &str) -> Self {
        Self::with_timeout(user_agent, DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(user_agent: &str, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            cache: Arc::new(Mutex::new(HashMap::new())),
            retry_limit: RETRY_LIMIT,
            retry_wait: RETRY_WAIT,
        }
    }

    pub fn with_retry(mut self, limit: usize, wait: Duration) -> Self {
        self.retry_limit = limit;
        self.retry_wait = wait;
        self
    }

    /// GET a page body, going through the in-run cache so no URL is pulled
    /// down twice. Transport failures and 5xx responses are retried a
    /// bounded number of times; anything else fails immediately.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        {
            let cache = self.cache.lock().await;
            if let Some(body) = cache.get(url) {
                debug!("Getting {} from cache", url);
                return Ok(body.clone());
            }
        }

        let mut try_count = 0;
        loop {
            debug!("Pulling down {}", url);
            match self.fetch_once(url).await {
                Ok(body) => {
                    let mut cache = self.cache.lock().await;
                    cache.insert(url.to_string(), body.clone());
                    return Ok(body);
                }
                Err(e) if try_count < self.retry_limit && is_retryable(&e) => {
                    try_count += 1;
                    warn!(
                        "Retrying {} ({}/{}) following {}",
                        url, try_count, self.retry_limit, e
                    );
                    tokio::time::sleep(self.retry_wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::BadStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    pub async fn cached_page_count(&self) -> usize {
        self.cache.lock().await.len()
    }

    /// Dump every cached body to `<dir>/page_cache/`, one file per page,
    /// for downstream checks that re-read the same pages. Returns the
    /// number of files written.
    pub async fn export_cache(&self, dir: &Path) -> Result<usize> {
        let output_dir = dir.join("page_cache");
        std::fs::create_dir_all(&output_dir)?;

        let cache = self.cache.lock().await;
        let mut counter = 0;
        for (url, body) in cache.iter() {
            std::fs::write(cache_file_path(&output_dir, url), body)?;
            counter += 1;
        }
        debug!("{} files dumped to {}", counter, output_dir.display());
        Ok(counter)
    }
}

fn cache_file_path(output_dir: &Path, url: &str) -> PathBuf {
    let mut key = url.to_string();
    if key.ends_with('/') {
        // Suffix path-like URIs so the dumped cache is easy to filter
        key.push_str(".html");
    }
    let quoted = utf8_percent_encode(&key, CACHE_KEY_SET)
        .to_string()
        .replace("%2F", "_");
    output_dir.join(quoted)
}

fn is_retryable(error: &ScanError) -> bool {
    match error {
        ScanError::Http(e) => e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode(),
        ScanError::BadStatus { status, .. } => (500..=599).contains(status),
        _ => false,
    }
}
