pub mod error;
pub mod extract;
pub mod fetcher;
pub mod result;
pub mod sitemap;

pub use error::ScanError;
pub use extract::extract_outbound_links;
pub use fetcher::PageFetcher;
pub use result::{IssueKind, OutboundUrl, PageUrl, ScanIssue};
pub use sitemap::{BatchSpec, SitemapResolver, partition};
