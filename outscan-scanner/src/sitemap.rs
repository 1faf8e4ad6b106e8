use crate::error::{Result, ScanError};
use crate::fetcher::PageFetcher;
use crate::result::{PageUrl, ScanIssue};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::VecDeque;
use std::str::FromStr;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_MAX_DEPTH: usize = 5;

/// One parsed sitemap document. Child sitemaps and page URLs may coexist
/// in a single document.
#[derive(Debug, Default)]
pub struct SitemapDoc {
    pub sitemaps: Vec<String>,
    pub pages: Vec<String>,
}

/// Pull every `<sitemap><loc>` and `<url><loc>` out of a sitemap document.
/// A document with neither a `<sitemapindex>` nor a `<urlset>` root is not
/// a sitemap and is rejected.
pub fn parse_sitemap(xml: &str) -> std::result::Result<SitemapDoc, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut doc = SitemapDoc::default();
    let mut buf = Vec::new();
    let mut saw_root = false;
    let mut in_sitemap = false;
    let mut in_url = false;
    let mut in_loc = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                match e.local_name().as_ref() {
                    b"sitemapindex" | b"urlset" => saw_root = true,
                    b"sitemap" => in_sitemap = true,
                    b"url" => in_url = true,
                    b"loc" if in_sitemap || in_url => in_loc = true,
                    _ => {}
                }
            }
            Ok(Event::Text(e)) if in_loc => {
                let loc = e
                    .unescape()
                    .map_err(|e| e.to_string())?
                    .trim()
                    .to_string();
                if !loc.is_empty() {
                    if in_sitemap {
                        doc.sitemaps.push(loc);
                    } else {
                        doc.pages.push(loc);
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"sitemap" => in_sitemap = false,
                b"url" => in_url = false,
                b"loc" => in_loc = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err("no <sitemapindex> or <urlset> element found".to_string());
    }
    Ok(doc)
}

/// Flattens a sitemap tree into the list of pages to check.
///
/// By default every discovered URL (child sitemaps and pages alike) has its
/// scheme and host rewritten to those of the root sitemap URL, so that a
/// sitemap served by one host (say, an origin server) whose entries point
/// at another (the CDN) still tests the host we were actually given.
/// `maintain_hostname` switches that rewrite off.
pub struct SitemapResolver<'a> {
    fetcher: &'a PageFetcher,
    maintain_hostname: bool,
    max_depth: usize,
}

impl<'a> SitemapResolver<'a> {
    pub fn new(fetcher: &'a PageFetcher) -> Self {
        Self {
            fetcher,
            maintain_hostname: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_maintain_hostname(mut self, maintain: bool) -> Self {
        self.maintain_hostname = maintain;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Walk the sitemap tree breadth-first and collect every page URL.
    ///
    /// A root document that cannot be fetched or is not a sitemap is fatal;
    /// any failure further down skips that sub-tree and is recorded as a
    /// resolution issue instead. The depth ceiling guards against
    /// self-referential or adversarially deep sitemap trees.
    pub async fn resolve(&self, root_sitemap_url: &str) -> Result<(Vec<PageUrl>, Vec<ScanIssue>)> {
        let origin = Url::parse(root_sitemap_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{root_sitemap_url}: {e}")))?;

        let mut pages = Vec::new();
        let mut issues = Vec::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((root_sitemap_url.to_string(), 0));
        let mut is_root = true;

        while let Some((sitemap_url, depth)) = queue.pop_front() {
            debug!("Diving into {}", sitemap_url);
            let doc = match self.load_sitemap(&sitemap_url).await {
                Ok(doc) => doc,
                Err(e) if is_root => return Err(e),
                Err(e) => {
                    warn!("Skipping sitemap {}: {}", sitemap_url, e);
                    issues.push(ScanIssue::resolution(&sitemap_url, e.to_string()));
                    continue;
                }
            };
            is_root = false;

            if !doc.sitemaps.is_empty() {
                debug!("Discovered {} child sitemaps", doc.sitemaps.len());
            }
            for child in doc.sitemaps {
                if depth + 1 > self.max_depth {
                    warn!("Sitemap nesting too deep at {}", child);
                    issues.push(ScanIssue::resolution(
                        &child,
                        ScanError::SitemapDepth {
                            url: sitemap_url.clone(),
                            limit: self.max_depth,
                        }
                        .to_string(),
                    ));
                    continue;
                }
                match self.align_host(&child, &origin) {
                    Ok(child) => queue.push_back((child, depth + 1)),
                    Err(e) => issues.push(ScanIssue::resolution(&child, e.to_string())),
                }
            }

            for page in doc.pages {
                match self.align_host(&page, &origin) {
                    Ok(page) => pages.push(PageUrl::new(page, sitemap_url.clone())),
                    Err(e) => issues.push(ScanIssue::resolution(&page, e.to_string())),
                }
            }
        }

        info!("Discovered {} URLs to check", pages.len());
        Ok((pages, issues))
    }

    async fn load_sitemap(&self, sitemap_url: &str) -> Result<SitemapDoc> {
        let body = self.fetcher.fetch(sitemap_url).await?;
        parse_sitemap(&body).map_err(|reason| ScanError::SitemapParse {
            url: sitemap_url.to_string(),
            reason,
        })
    }

    fn align_host(&self, raw: &str, origin: &Url) -> Result<String> {
        let mut parsed =
            Url::parse(raw).map_err(|e| ScanError::InvalidUrl(format!("{raw}: {e}")))?;
        if self.maintain_hostname {
            return Ok(parsed.into());
        }
        parsed
            .set_scheme(origin.scheme())
            .map_err(|_| ScanError::InvalidUrl(format!("cannot set scheme on {raw}")))?;
        parsed
            .set_host(origin.host_str())
            .map_err(|e| ScanError::InvalidUrl(format!("cannot set host on {raw}: {e}")))?;
        parsed
            .set_port(origin.port())
            .map_err(|_| ScanError::InvalidUrl(format!("cannot set port on {raw}")))?;
        Ok(parsed.into())
    }
}

/// Which slice of the flattened page list this run works on. `1/1` means
/// the whole list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSpec {
    pub number: usize,
    pub total: usize,
}

impl Default for BatchSpec {
    fn default() -> Self {
        Self { number: 1, total: 1 }
    }
}

impl BatchSpec {
    pub fn is_noop(&self) -> bool {
        self.total == 1
    }

    /// Batch identifier embedded in report filenames.
    pub fn label(&self) -> String {
        if self.is_noop() {
            "all".to_string()
        } else {
            self.number.to_string()
        }
    }
}

impl FromStr for BatchSpec {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || ScanError::InvalidBatch(s.to_string());
        let (number, total) = s.split_once(['/', ':']).ok_or_else(bad)?;
        let number: usize = number.trim().parse().map_err(|_| bad())?;
        let total: usize = total.trim().parse().map_err(|_| bad())?;
        if number < 1 || total < 1 || number > total {
            return Err(bad());
        }
        Ok(Self { number, total })
    }
}

/// Deterministically select one batch of pages: stable-sort the full list
/// by URL, split it into `total` contiguous slices whose sizes differ by at
/// most one, and keep slice `number`. Every kept page is stamped with its
/// batch number.
pub fn partition(mut pages: Vec<PageUrl>, spec: BatchSpec) -> Vec<PageUrl> {
    pages.sort_by(|a, b| a.url.cmp(&b.url));

    let len = pages.len();
    let base = len / spec.total;
    let extra = len % spec.total;
    let k = spec.number - 1;
    let start = k * base + k.min(extra);
    let size = base + usize::from(k < extra);

    pages
        .into_iter()
        .skip(start)
        .take(size)
        .map(|mut page| {
            page.batch = spec.number;
            page
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_fetcher() -> PageFetcher {
        PageFetcher::with_timeout("outscan-tests", 5).with_retry(0, Duration::from_millis(0))
    }

    fn page(url: &str) -> PageUrl {
        PageUrl::new(url.to_string(), "https://example.com/sitemap.xml".to_string())
    }

    async fn mount_xml(server: &MockServer, route: &str, xml: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/xml")
                    .set_body_string(xml),
            )
            .mount(server)
            .await;
    }

    // ------------------------------------------------------------------
    // parse_sitemap
    // ------------------------------------------------------------------

    #[test]
    fn test_parse_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>https://example.com/</loc></url>
          <url>
            <loc>
              https://example.com/about
            </loc>
            <lastmod>2024-01-15</lastmod>
          </url>
        </urlset>"#;
        let doc = parse_sitemap(xml).unwrap();
        assert!(doc.sitemaps.is_empty());
        assert_eq!(
            doc.pages,
            vec!["https://example.com/", "https://example.com/about"]
        );
    }

    #[test]
    fn test_parse_sitemapindex() {
        let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <sitemap><loc>https://example.com/sitemap_a.xml</loc></sitemap>
          <sitemap><loc>https://example.com/sitemap_b.xml</loc></sitemap>
        </sitemapindex>"#;
        let doc = parse_sitemap(xml).unwrap();
        assert_eq!(doc.sitemaps.len(), 2);
        assert!(doc.pages.is_empty());
    }

    #[test]
    fn test_parse_rejects_non_sitemap_document() {
        let err = parse_sitemap("<html><body>not a sitemap</body></html>").unwrap_err();
        assert!(err.contains("no <sitemapindex> or <urlset>"));
    }

    #[test]
    fn test_parse_ignores_loc_outside_entries() {
        // A stray <loc> not wrapped in <url> or <sitemap> contributes nothing
        let xml = r#"<urlset><loc>https://example.com/stray</loc>
          <url><loc>https://example.com/real</loc></url></urlset>"#;
        let doc = parse_sitemap(xml).unwrap();
        assert_eq!(doc.pages, vec!["https://example.com/real"]);
    }

    // ------------------------------------------------------------------
    // BatchSpec
    // ------------------------------------------------------------------

    #[test]
    fn test_batch_spec_parses_both_separators() {
        assert_eq!(
            "2/3".parse::<BatchSpec>().unwrap(),
            BatchSpec { number: 2, total: 3 }
        );
        assert_eq!(
            "2:3".parse::<BatchSpec>().unwrap(),
            BatchSpec { number: 2, total: 3 }
        );
    }

    #[test]
    fn test_batch_spec_rejects_nonsense() {
        for bad in ["", "3", "0/2", "3/2", "a/b", "1/0", "-1/2"] {
            assert!(bad.parse::<BatchSpec>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_batch_spec_labels() {
        assert_eq!("1/1".parse::<BatchSpec>().unwrap().label(), "all");
        assert_eq!("3/4".parse::<BatchSpec>().unwrap().label(), "3");
    }

    // ------------------------------------------------------------------
    // partition
    // ------------------------------------------------------------------

    #[test]
    fn test_partition_covers_every_page_exactly_once() {
        let urls: Vec<PageUrl> = (0..10)
            .map(|i| page(&format!("https://example.com/page{i:02}")))
            .collect();

        for total in 1..=4 {
            let mut seen = Vec::new();
            let mut sizes = Vec::new();
            for number in 1..=total {
                let slice = partition(urls.clone(), BatchSpec { number, total });
                sizes.push(slice.len());
                for p in &slice {
                    assert_eq!(p.batch, number);
                }
                seen.extend(slice.into_iter().map(|p| p.url));
            }
            seen.sort();
            let mut expected: Vec<String> = urls.iter().map(|p| p.url.clone()).collect();
            expected.sort();
            assert_eq!(seen, expected, "N={total} dropped or duplicated pages");

            let min = sizes.iter().min().unwrap();
            let max = sizes.iter().max().unwrap();
            assert!(max - min <= 1, "N={total} slice sizes {sizes:?}");
        }
    }

    #[test]
    fn test_partition_with_more_batches_than_pages() {
        let urls = vec![page("https://example.com/only")];
        let first = partition(urls.clone(), BatchSpec { number: 1, total: 3 });
        let second = partition(urls.clone(), BatchSpec { number: 2, total: 3 });
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn test_partition_orders_by_url() {
        let urls = vec![
            page("https://example.com/zebra"),
            page("https://example.com/apple"),
        ];
        let all = partition(urls, BatchSpec::default());
        assert_eq!(all[0].url, "https://example.com/apple");
        assert_eq!(all[1].url, "https://example.com/zebra");
    }

    // ------------------------------------------------------------------
    // SitemapResolver
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_resolve_flat_urlset() {
        let mock_server = MockServer::start().await;
        let xml = format!(
            r#"<urlset>
              <url><loc>{0}/page1</loc></url>
              <url><loc>{0}/page2</loc></url>
            </urlset>"#,
            mock_server.uri()
        );
        mount_xml(&mock_server, "/sitemap.xml", xml).await;

        let fetcher = test_fetcher();
        let resolver = SitemapResolver::new(&fetcher);
        let (pages, issues) = resolver
            .resolve(&format!("{}/sitemap.xml", mock_server.uri()))
            .await
            .unwrap();

        assert!(issues.is_empty());
        assert_eq!(pages.len(), 2);
        assert_eq!(
            pages[0].source_sitemap.as_deref(),
            Some(format!("{}/sitemap.xml", mock_server.uri()).as_str())
        );
    }

    #[tokio::test]
    async fn test_resolve_recurses_into_index() {
        let mock_server = MockServer::start().await;
        let index = format!(
            r#"<sitemapindex>
              <sitemap><loc>{0}/sitemap_a.xml</loc></sitemap>
              <sitemap><loc>{0}/sitemap_b.xml</loc></sitemap>
            </sitemapindex>"#,
            mock_server.uri()
        );
        let child_a = format!(
            "<urlset><url><loc>{}/a1</loc></url></urlset>",
            mock_server.uri()
        );
        let child_b = format!(
            "<urlset><url><loc>{}/b1</loc></url></urlset>",
            mock_server.uri()
        );
        mount_xml(&mock_server, "/sitemap.xml", index).await;
        mount_xml(&mock_server, "/sitemap_a.xml", child_a).await;
        mount_xml(&mock_server, "/sitemap_b.xml", child_b).await;

        let fetcher = test_fetcher();
        let resolver = SitemapResolver::new(&fetcher);
        let (pages, issues) = resolver
            .resolve(&format!("{}/sitemap.xml", mock_server.uri()))
            .await
            .unwrap();

        assert!(issues.is_empty());
        let mut urls: Vec<&str> = pages.iter().map(|p| p.url.as_str()).collect();
        urls.sort();
        assert_eq!(
            urls,
            vec![
                format!("{}/a1", mock_server.uri()),
                format!("{}/b1", mock_server.uri())
            ]
        );
    }

    #[tokio::test]
    async fn test_resolve_rewrites_hostname_by_default() {
        let mock_server = MockServer::start().await;
        let xml = r#"<urlset>
          <url><loc>https://origin.example/page1</loc></url>
        </urlset>"#;
        mount_xml(&mock_server, "/all-urls.xml", xml.to_string()).await;

        let fetcher = test_fetcher();
        let resolver = SitemapResolver::new(&fetcher);
        let (pages, _) = resolver
            .resolve(&format!("{}/all-urls.xml", mock_server.uri()))
            .await
            .unwrap();

        // The page keeps its path but is re-homed onto the sitemap's host
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, format!("{}/page1", mock_server.uri()));
    }

    #[tokio::test]
    async fn test_resolve_maintains_hostname_when_asked() {
        let mock_server = MockServer::start().await;
        let xml = r#"<urlset>
          <url><loc>https://origin.example/page1</loc></url>
        </urlset>"#;
        mount_xml(&mock_server, "/all-urls.xml", xml.to_string()).await;

        let fetcher = test_fetcher();
        let resolver = SitemapResolver::new(&fetcher).with_maintain_hostname(true);
        let (pages, _) = resolver
            .resolve(&format!("{}/all-urls.xml", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, "https://origin.example/page1");
    }

    #[tokio::test]
    async fn test_resolve_records_issue_for_broken_child() {
        let mock_server = MockServer::start().await;
        let index = format!(
            r#"<sitemapindex>
              <sitemap><loc>{0}/broken.xml</loc></sitemap>
              <sitemap><loc>{0}/good.xml</loc></sitemap>
            </sitemapindex>"#,
            mock_server.uri()
        );
        let good = format!(
            "<urlset><url><loc>{}/fine</loc></url></urlset>",
            mock_server.uri()
        );
        mount_xml(&mock_server, "/sitemap.xml", index).await;
        mount_xml(&mock_server, "/broken.xml", "<html>oops</html>".to_string()).await;
        mount_xml(&mock_server, "/good.xml", good).await;

        let fetcher = test_fetcher();
        let resolver = SitemapResolver::new(&fetcher);
        let (pages, issues) = resolver
            .resolve(&format!("{}/sitemap.xml", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, format!("{}/fine", mock_server.uri()));
        assert_eq!(issues.len(), 1);
        assert!(issues[0].url.contains("/broken.xml"));
    }

    #[tokio::test]
    async fn test_resolve_unfetchable_root_is_fatal() {
        let mock_server = MockServer::start().await;
        // No mocks mounted: every request 404s

        let fetcher = test_fetcher();
        let resolver = SitemapResolver::new(&fetcher);
        let result = resolver
            .resolve(&format!("{}/sitemap.xml", mock_server.uri()))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_resolve_terminates_on_sitemap_cycle() {
        let mock_server = MockServer::start().await;
        // The sitemap lists itself as its own child
        let xml = format!(
            r#"<sitemapindex>
              <sitemap><loc>{}/sitemap.xml</loc></sitemap>
            </sitemapindex>"#,
            mock_server.uri()
        );
        mount_xml(&mock_server, "/sitemap.xml", xml).await;

        let fetcher = test_fetcher();
        let resolver = SitemapResolver::new(&fetcher).with_max_depth(3);
        let (pages, issues) = resolver
            .resolve(&format!("{}/sitemap.xml", mock_server.uri()))
            .await
            .unwrap();

        assert!(pages.is_empty());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].detail.contains("nesting exceeded"));
    }
}
