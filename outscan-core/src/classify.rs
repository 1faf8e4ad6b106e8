use crate::allowlist::Allowlist;
use outscan_scanner::{OutboundUrl, ScanIssue};
use std::collections::{HashMap, HashSet};

/// The accumulator for one run (or one batch). Unexpected URLs are held in
/// two symmetric views: URL -> referencing pages and page -> unexpected
/// URLs; the flat deduplicated view is the projection of the first view's
/// keys. Insertion is idempotent per (URL, page) pair, so classifying the
/// same links twice changes nothing.
///
/// Iteration order of the maps is not part of the contract; the report
/// builder sorts everything it emits.
#[derive(Debug, Default)]
pub struct ScanResult {
    by_url: HashMap<String, HashSet<String>>,
    by_page: HashMap<String, HashSet<String>>,
    issues: Vec<ScanIssue>,
    pages_checked: usize,
}

impl ScanResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide expected vs. unexpected and accumulate. Pure decision plus
    /// bookkeeping: no I/O happens here.
    pub fn classify(&mut self, outbound: &OutboundUrl, allowlist: &Allowlist) {
        if allowlist.is_expected(&outbound.url) {
            return;
        }
        self.by_url
            .entry(outbound.url.clone())
            .or_default()
            .insert(outbound.page.clone());
        self.by_page
            .entry(outbound.page.clone())
            .or_default()
            .insert(outbound.url.clone());
    }

    pub fn record_issue(&mut self, issue: ScanIssue) {
        self.issues.push(issue);
    }

    pub fn extend_issues(&mut self, issues: impl IntoIterator<Item = ScanIssue>) {
        self.issues.extend(issues);
    }

    pub fn mark_page_checked(&mut self) {
        self.pages_checked += 1;
    }

    pub fn pages_checked(&self) -> usize {
        self.pages_checked
    }

    /// Unexpected URL -> pages referencing it.
    pub fn by_url(&self) -> &HashMap<String, HashSet<String>> {
        &self.by_url
    }

    /// Page -> unexpected URLs found on it.
    pub fn by_page(&self) -> &HashMap<String, HashSet<String>> {
        &self.by_page
    }

    /// The flat deduplicated view, sorted for stable output.
    pub fn unexpected_urls(&self) -> Vec<&str> {
        let mut urls: Vec<&str> = self.by_url.keys().map(String::as_str).collect();
        urls.sort_unstable();
        urls
    }

    pub fn issues(&self) -> &[ScanIssue] {
        &self.issues
    }

    pub fn has_unexpected(&self) -> bool {
        !self.by_url.is_empty()
    }

    /// True when there is nothing to report: no violations and no
    /// recoverable failures.
    pub fn is_clean(&self) -> bool {
        self.by_url.is_empty() && self.issues.is_empty()
    }
}
