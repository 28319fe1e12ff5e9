//! Acceptance checks for resolved chapter URLs

use crate::resolver::Resolver;
use crate::session::{Blacklist, Chapter};
use crate::url::extract_domain;
use reqwest::StatusCode;
use tracing::{debug, info};
use url::Url;

impl Resolver {
    /// Accepts a candidate that is not blacklisted, answers a `HEAD` probe
    /// with something other than 404, and is permitted by robots.txt
    ///
    /// A rejected candidate is never an error; resolution moves on.
    pub(crate) async fn accept_candidate(&self, url: &Url, blacklist: &Blacklist) -> bool {
        let Some(domain) = extract_domain(url) else {
            debug!(url = %url, "Candidate has no host");
            return false;
        };
        if blacklist.contains(&domain) {
            info!(url = %url, domain = %domain, "Skipping blacklisted candidate");
            return false;
        }

        match self.client.head(url.clone()).send().await {
            Ok(response) if response.status() == StatusCode::NOT_FOUND => {
                info!(url = %url, "Candidate is a dead link, checking next");
                return false;
            }
            Ok(response) => {
                debug!(url = %url, status = response.status().as_u16(), "Candidate reachable");
            }
            Err(e) => {
                info!(url = %url, error = %e, "Candidate unreachable, checking next");
                return false;
            }
        }

        if !self.robots.is_permitted(&self.user_agent, url).await {
            info!(url = %url, "Candidate not crawlable, checking next");
            return false;
        }

        true
    }
}

/// Whether a search result's page title names the wanted title and chapter
pub(crate) fn title_matches(page_title: &str, title: &str, chapter: Chapter) -> bool {
    let page_title = page_title.to_lowercase();
    page_title.contains(&title.to_lowercase()) && page_title.contains(&chapter.to_string())
}
