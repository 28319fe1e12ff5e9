//! Domains excluded from resolution

use crate::url::matches_wildcard;
use tracing::info;

/// Ordered set of domain patterns excluded from resolution
///
/// Grows monotonically during a session. Entries may be exact hosts or
/// `*.`-prefixed wildcards. Persisted as a comma-separated list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    domains: Vec<String>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the comma-separated form used by the settings store
    pub fn from_csv(csv: &str) -> Self {
        csv.split(',').collect()
    }

    /// Comma-separated form for the settings store
    pub fn to_csv(&self) -> String {
        self.domains.join(",")
    }

    /// Adds a domain; returns false when it was already present
    pub fn insert(&mut self, domain: &str) -> bool {
        let domain = domain.trim().to_lowercase();
        if domain.is_empty() || self.domains.contains(&domain) {
            return false;
        }
        info!(domain = %domain, "Blacklisted domain");
        self.domains.push(domain);
        true
    }

    /// Returns true when `domain` matches any entry
    pub fn contains(&self, domain: &str) -> bool {
        let domain = domain.to_lowercase();
        self.domains
            .iter()
            .any(|pattern| matches_wildcard(pattern, &domain))
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Blacklist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut blacklist = Self::new();
        for domain in iter {
            let domain = domain.as_ref().trim().to_lowercase();
            if !domain.is_empty() && !blacklist.domains.contains(&domain) {
                blacklist.domains.push(domain);
            }
        }
        blacklist
    }
}
