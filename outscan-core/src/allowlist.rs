use crate::error::{CheckError, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use url::Url;

/// A single allowlist entry: an exact URL, or a pattern compiled once at
/// load time. Patterns should anchor themselves (`^https://...`) if they
/// mean to match from the start.
#[derive(Debug, Clone)]
pub enum Rule {
    Literal(String),
    Pattern(Regex),
}

impl Rule {
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Rule::Literal(literal) => literal == url,
            Rule::Pattern(regex) => regex.is_match(url),
        }
    }
}

/// On-disk shape of the allowlist document.
#[derive(Debug, Default, Deserialize)]
struct AllowlistFile {
    /// When present, the file only applies to the hostnames it names.
    #[serde(default)]
    relevant_hostnames: Vec<String>,
    #[serde(default)]
    allowed_outbound_url_literals: Vec<String>,
    #[serde(default)]
    allowed_outbound_url_regexes: Vec<String>,
}

/// The set of outbound destinations considered expected. Literals sit in a
/// hash set for O(1) lookups; patterns are scanned linearly only when no
/// literal matched. The scanned site's own hostname is implicitly allowed.
#[derive(Debug, Default)]
pub struct Allowlist {
    literals: HashSet<String>,
    patterns: Vec<Regex>,
    site_host: Option<String>,
}

impl Allowlist {
    /// An allowlist with no rules: everything off-site is unexpected.
    pub fn empty(site_host: &str) -> Self {
        Self {
            site_host: Some(site_host.to_string()),
            ..Default::default()
        }
    }

    /// Load and compile the YAML allowlist for `site_host`. Fails fast on
    /// unreadable files, invalid YAML, or any pattern that does not
    /// compile. A file scoped to other hostnames yields an empty allowlist
    /// rather than an error, so misconfigured runs report loudly instead
    /// of passing silently.
    pub fn load(path: impl AsRef<Path>, site_host: &str) -> Result<Self> {
        let path = path.as_ref();
        debug!("Seeking an appropriate allowlist in {}", path.display());

        let raw = fs::read_to_string(path).map_err(|e| CheckError::ConfigIo {
            path: path.display().to_string(),
            source: e,
        })?;
        let file: AllowlistFile =
            serde_yaml::from_str(&raw).map_err(|e| CheckError::ConfigYaml {
                path: path.display().to_string(),
                source: e,
            })?;

        if !file.relevant_hostnames.is_empty()
            && !file.relevant_hostnames.iter().any(|h| h == site_host)
        {
            warn!(
                "No allowlist in {} covers {}, treating all outbound URLs as unexpected",
                path.display(),
                site_host
            );
            return Ok(Self::empty(site_host));
        }

        let mut allowlist = Self::empty(site_host);
        for literal in file.allowed_outbound_url_literals {
            allowlist.insert(Rule::Literal(literal));
        }
        for pattern in file.allowed_outbound_url_regexes {
            let regex = Regex::new(&pattern).map_err(|e| CheckError::BadPattern {
                pattern: pattern.clone(),
                source: e,
            })?;
            allowlist.insert(Rule::Pattern(regex));
        }

        debug!(
            "Loaded {} literal and {} pattern rules",
            allowlist.literals.len(),
            allowlist.patterns.len()
        );
        Ok(allowlist)
    }

    pub fn insert(&mut self, rule: Rule) {
        match rule {
            Rule::Literal(literal) => {
                self.literals.insert(literal);
            }
            Rule::Pattern(regex) => self.patterns.push(regex),
        }
    }

    /// Decide whether an outbound URL is expected. Cheapest check first:
    /// literal set membership, then the pattern scan, and finally the
    /// implicit own-site rule.
    pub fn is_expected(&self, url: &str) -> bool {
        if self.literals.contains(url) {
            return true;
        }
        if self.patterns.iter().any(|regex| regex.is_match(url)) {
            return true;
        }
        self.is_own_host(url)
    }

    fn is_own_host(&self, url: &str) -> bool {
        let Some(site_host) = &self.site_host else {
            return false;
        };
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        // site_host is in netloc form: explicit ports included
        match parsed.port() {
            Some(port) => format!("{host}:{port}") == *site_host,
            None => host == site_host,
        }
    }
}
