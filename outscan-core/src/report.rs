// Report generation from the scan accumulator

use crate::classify::ScanResult;
use crate::error::Result;
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub const UNEXPECTED_URLS_FILENAME_FRAGMENT: &str = "unexpected_urls_for";

/// Where each artifact of a run was written.
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub flat: PathBuf,
    pub nested: PathBuf,
    pub structured: PathBuf,
    pub issues: Option<PathBuf>,
}

/// Flat view: one unexpected URL per line, deduplicated and sorted.
pub fn generate_flat_report(result: &ScanResult) -> String {
    result.unexpected_urls().join("\n")
}

/// Nested view: each unexpected URL followed by the pages referencing it.
pub fn generate_nested_report(result: &ScanResult) -> String {
    let mut report = String::new();
    for url in result.unexpected_urls() {
        let mut pages: Vec<&str> = result.by_url()[url]
            .iter()
            .map(String::as_str)
            .collect();
        pages.sort_unstable();
        report.push_str(&format!(
            "\nUnexpected URL: {}\nFound in:\n\t{}\n",
            url,
            pages.join("\n\t"),
        ));
    }
    report
}

/// Structured view: page -> sorted unexpected URLs found on it. This is
/// the shape the downstream allowlist-update workflow consumes.
pub fn generate_structured_json(result: &ScanResult) -> Result<String> {
    let mut structured: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (page, urls) in result.by_page() {
        let mut urls: Vec<&str> = urls.iter().map(String::as_str).collect();
        urls.sort_unstable();
        structured.insert(page.as_str(), urls);
    }
    Ok(serde_json::to_string(&structured)?)
}

/// The recoverable-failure log, in the order failures happened.
pub fn generate_issue_log(result: &ScanResult) -> String {
    let mut log = String::new();
    for issue in result.issues() {
        log.push_str(&format!(
            "{} failure for {}: {}\n",
            issue.kind, issue.url, issue.detail
        ));
    }
    log
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Write the artifact triple (plus the issue log when failures occurred)
/// for one run. A clean run writes nothing, so CI can treat the mere
/// existence of output files as the signal. Returns the written paths.
pub fn write_reports(
    result: &ScanResult,
    hostname: &str,
    batch_label: &str,
    output_dir: &Path,
) -> Result<Option<ReportPaths>> {
    if result.is_clean() {
        info!("Checks completed and no unexpected outbound URLs found");
        return Ok(None);
    }

    std::fs::create_dir_all(output_dir)?;

    // Github Actions doesn't like colons in artifact filenames
    let now = Utc::now().format("%Y-%m-%dT%H-%M-%S");
    let base = format!("{UNEXPECTED_URLS_FILENAME_FRAGMENT}_{hostname}_{batch_label}_{now}");

    let flat = output_dir.join(format!("{base}_flat.txt"));
    save_report(&generate_flat_report(result), &flat)?;
    info!("List of unexpected URLs output to {}", flat.display());

    let nested = output_dir.join(format!("{base}_nested.txt"));
    save_report(&generate_nested_report(result), &nested)?;
    info!(
        "List of unexpected URLs and their source pages output to {}",
        nested.display()
    );

    let structured = output_dir.join(format!("{base}_structured.json"));
    save_report(&generate_structured_json(result)?, &structured)?;
    info!("JSON version of results output to {}", structured.display());

    let issues = if result.issues().is_empty() {
        None
    } else {
        let path = output_dir.join(format!("{base}_issues.txt"));
        save_report(&generate_issue_log(result), &path)?;
        info!("Scan issue log output to {}", path.display());
        Some(path)
    };

    Ok(Some(ReportPaths {
        flat,
        nested,
        structured,
        issues,
    }))
}
