use crate::allowlist::Allowlist;
use crate::classify::ScanResult;
use crate::config::ScanOptions;
use crate::error::{CheckError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use outscan_scanner::extract_outbound_links;
use outscan_scanner::fetcher::PageFetcher;
use outscan_scanner::result::{PageUrl, ScanIssue};
use outscan_scanner::sitemap::{SitemapResolver, partition};
use std::sync::Arc;
use tracing::{info, warn};

/// Callback for reporting per-page progress: (index, page URL).
pub type ScanProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Execute one scan run: resolve the page list, then page by page fetch,
/// extract and classify. Fetch failures are recorded and skipped; only
/// configuration problems and an unresolvable root sitemap abort the run.
///
/// Pages are processed sequentially, so the accumulator has a single
/// writer and page order cannot affect the final contents.
pub async fn execute_scan(
    options: &ScanOptions,
    allowlist: &Allowlist,
    progress_callback: Option<ScanProgressCallback>,
) -> Result<ScanResult> {
    let fetcher = PageFetcher::with_timeout(&options.user_agent, options.timeout_secs);
    let mut result = ScanResult::new();

    let pages = gather_pages(options, &fetcher, &mut result).await?;
    info!("Checking {} pages for outbound links", pages.len());

    let progress_bar = if options.show_progress {
        let pb = ProgressBar::new(pages.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40}] {pos}/{len} {msg}")
                .unwrap(),
        );
        Some(pb)
    } else {
        None
    };

    for (idx, page) in pages.iter().enumerate() {
        if let Some(ref callback) = progress_callback {
            callback(idx, page.url.clone());
        }
        if let Some(ref pb) = progress_bar {
            pb.set_message(page.url.clone());
            pb.inc(1);
        }

        let body = match fetcher.fetch(&page.url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Could not fetch {}: {}", page.url, e);
                result.record_issue(ScanIssue::fetch(&page.url, e.to_string()));
                continue;
            }
        };

        for outbound in extract_outbound_links(&body, &page.url) {
            result.classify(&outbound, allowlist);
        }
        result.mark_page_checked();
    }

    if let Some(pb) = progress_bar {
        pb.finish_with_message(format!("{} pages checked", result.pages_checked()));
    }

    if options.export_cache {
        let count = fetcher.export_cache(&options.output_dir).await?;
        info!("{} cached pages exported", count);
    }

    Ok(result)
}

/// Put together the list of pages whose content we want to check:
/// specific URLs verbatim, or the flattened (and optionally batched)
/// sitemap tree plus any extra URLs kept out of the sitemap on purpose.
async fn gather_pages(
    options: &ScanOptions,
    fetcher: &PageFetcher,
    result: &mut ScanResult,
) -> Result<Vec<PageUrl>> {
    if !options.specific_urls.is_empty() {
        let mut pages: Vec<PageUrl> = options
            .specific_urls
            .iter()
            .map(|url| PageUrl::direct(url))
            .collect();
        pages.extend(options.extra_urls.iter().map(|url| PageUrl::direct(url)));
        return Ok(pages);
    }

    let Some(sitemap_url) = &options.sitemap_url else {
        return Err(CheckError::Config(
            "No sitemap or input URLs specified. Cannot proceed.".into(),
        ));
    };

    let resolver = SitemapResolver::new(fetcher)
        .with_maintain_hostname(options.maintain_hostname)
        .with_max_depth(options.max_sitemap_depth);
    let (mut pages, issues) = resolver.resolve(sitemap_url).await?;
    result.extend_issues(issues);

    pages.extend(options.extra_urls.iter().map(|url| PageUrl::direct(url)));
    Ok(partition(pages, options.batch))
}
