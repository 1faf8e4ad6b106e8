use serde::{Deserialize, Serialize};

/// A page identified for checking. Created during sitemap flattening and
/// read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageUrl {
    pub url: String,
    /// The sitemap document this page was listed in, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_sitemap: Option<String>,
    /// 1-based batch number assigned at partition time; 0 means unbatched.
    pub batch: usize,
}

impl PageUrl {
    pub fn new(url: String, source_sitemap: String) -> Self {
        Self {
            url,
            source_sitemap: Some(source_sitemap),
            batch: 0,
        }
    }

    /// A page supplied directly by the caller rather than via a sitemap.
    pub fn direct(url: &str) -> Self {
        Self {
            url: url.to_string(),
            source_sitemap: None,
            batch: 0,
        }
    }
}

/// A URL discovered as a link target on some page. The target is already
/// normalized: resolved against the owning page and fragment-stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutboundUrl {
    pub url: String,
    /// The page the link was found on.
    pub page: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    Resolution,
    Fetch,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IssueKind::Resolution => write!(f, "resolution"),
            IssueKind::Fetch => write!(f, "fetch"),
        }
    }
}

/// A recoverable failure recorded during a run. These never abort the scan;
/// they are surfaced next to the report so operators can tell "violations
/// found" apart from "scan incomplete".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanIssue {
    pub kind: IssueKind,
    pub url: String,
    pub detail: String,
}

impl ScanIssue {
    pub fn resolution(url: &str, detail: String) -> Self {
        Self {
            kind: IssueKind::Resolution,
            url: url.to_string(),
            detail,
        }
    }

    pub fn fetch(url: &str, detail: String) -> Self {
        Self {
            kind: IssueKind::Fetch,
            url: url.to_string(),
            detail,
        }
    }
}
