use crate::error::{CheckError, Result};
use outscan_scanner::BatchSpec;
use outscan_scanner::sitemap::DEFAULT_MAX_DEPTH;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

pub const DEFAULT_USER_AGENT: &str =
    "Outscan/0.3 (+https://github.com/trapdoorsec/outscan)";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Fully-resolved options for one run. The CLI layer builds this from
/// flags and environment fallbacks; nothing below this struct reads the
/// environment.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub sitemap_url: Option<String>,
    pub specific_urls: Vec<String>,
    /// Extra page URLs (already absolute) appended to the sitemap's list
    /// before batching, for pages deliberately kept out of the sitemap.
    pub extra_urls: Vec<String>,
    pub batch: BatchSpec,
    pub maintain_hostname: bool,
    pub export_cache: bool,
    pub output_dir: PathBuf,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_sitemap_depth: usize,
    pub show_progress: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            sitemap_url: None,
            specific_urls: Vec::new(),
            extra_urls: Vec::new(),
            batch: BatchSpec::default(),
            maintain_hostname: false,
            export_cache: false,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_sitemap_depth: DEFAULT_MAX_DEPTH,
            show_progress: false,
        }
    }
}

impl ScanOptions {
    /// The hostname this run is scanning, taken from the sitemap URL or
    /// the first specific URL.
    pub fn hostname(&self) -> Result<String> {
        let source = self
            .sitemap_url
            .as_deref()
            .or_else(|| self.specific_urls.first().map(String::as_str))
            .ok_or_else(|| {
                CheckError::Config("No sitemap or input URLs specified. Cannot proceed.".into())
            })?;
        let parsed = Url::parse(source)
            .map_err(|e| CheckError::Config(format!("Invalid URL {source}: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| CheckError::Config(format!("No hostname in {source}")))?;
        // Keep explicit ports (netloc form) so local test servers are
        // distinguishable
        Ok(match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ExtraUrlsFile {
    extra_urls_to_check: Vec<String>,
}

/// Load paths that should be checked even though the sitemap omits them,
/// and join them onto the scanned host.
pub fn load_extra_urls(path: impl AsRef<Path>, hostname: &str) -> Result<Vec<String>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|e| CheckError::ConfigIo {
        path: path.display().to_string(),
        source: e,
    })?;
    let file: ExtraUrlsFile = serde_yaml::from_str(&raw).map_err(|e| CheckError::ConfigYaml {
        path: path.display().to_string(),
        source: e,
    })?;

    let scheme = if hostname.starts_with("localhost") || hostname.starts_with("127.0.0.1") {
        "http"
    } else {
        "https"
    };
    Ok(file
        .extra_urls_to_check
        .iter()
        .map(|p| format!("{scheme}://{hostname}/{}", p.trim_start_matches('/')))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_hostname_from_sitemap_url() {
        let options = ScanOptions {
            sitemap_url: Some("https://www.example.com/sitemap.xml".to_string()),
            ..Default::default()
        };
        assert_eq!(options.hostname().unwrap(), "www.example.com");
    }

    #[test]
    fn test_hostname_from_first_specific_url() {
        let options = ScanOptions {
            specific_urls: vec!["https://origin.example.com/page".to_string()],
            ..Default::default()
        };
        assert_eq!(options.hostname().unwrap(), "origin.example.com");
    }

    #[test]
    fn test_hostname_requires_some_input() {
        let options = ScanOptions::default();
        assert!(options.hostname().is_err());
    }

    #[test]
    fn test_load_extra_urls_joins_onto_host() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "extra_urls_to_check:").unwrap();
        writeln!(file, "  - robots.txt").unwrap();
        writeln!(file, "  - /special/offer").unwrap();

        let urls = load_extra_urls(file.path(), "www.example.com").unwrap();
        assert_eq!(
            urls,
            vec![
                "https://www.example.com/robots.txt",
                "https://www.example.com/special/offer",
            ]
        );
    }

    #[test]
    fn test_load_extra_urls_uses_http_for_localhost() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "extra_urls_to_check:").unwrap();
        writeln!(file, "  - page").unwrap();

        let urls = load_extra_urls(file.path(), "localhost:8000").unwrap();
        assert_eq!(urls, vec!["http://localhost:8000/page"]);
    }
}
