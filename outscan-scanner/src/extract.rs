use crate::result::OutboundUrl;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

/// The element/attribute pairs that carry outbound references: anchors,
/// script sources, and link tags (stylesheets, feeds, preloads).
const LINK_SOURCES: [(&str, &str); 3] = [
    ("a[href]", "href"),
    ("script[src]", "src"),
    ("link[href]", "href"),
];

/// Single pass over a fetched document, yielding the normalized absolute
/// target of every hyperlink-bearing element. Relative hrefs resolve
/// against `page_url`; fragments are stripped, query strings and trailing
/// slashes are kept as-is. Broken markup degrades to whatever the parser
/// still recognizes.
pub fn extract_outbound_links(html: &str, page_url: &str) -> Vec<OutboundUrl> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    for (css, attr) in LINK_SOURCES {
        let selector = Selector::parse(css).unwrap();
        for element in document.select(&selector) {
            if let Some(raw) = element.value().attr(attr)
                && let Some(url) = resolve_href(page_url, raw)
            {
                debug!("Found outbound link on {}: {}", page_url, url);
                links.push(OutboundUrl {
                    url,
                    page: page_url.to_string(),
                });
            }
        }
    }

    links
}

fn resolve_href(base: &str, href: &str) -> Option<String> {
    // Skip empty, javascript:, mailto:, tel:, data: and bare fragments
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
        || href.starts_with('#')
    {
        return None;
    }

    let base_url = Url::parse(base).ok()?;
    let mut resolved = base_url.join(href).ok()?;

    // Fragments carry no server-side meaning
    resolved.set_fragment(None);

    Some(resolved.to_string())
}
