//! Crawl permission checks
//!
//! Fetches, parses and caches robots.txt per origin. A policy that cannot be
//! fetched (network error or non-success status) permits the URL; any other
//! failure while evaluating denies it.

mod cache;
mod parser;

pub use cache::CachedRobots;
pub use parser::ParsedRobots;

use crate::url::{origin_key, robots_url};
use crate::{ChapterError, Result};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

/// Outcome of fetching a robots.txt document
enum PolicyFetch {
    /// The document was retrieved
    Document(ParsedRobots),
    /// The server answered with a non-success status
    Missing(u16),
    /// The request never produced a response
    Unreachable(reqwest::Error),
}

/// Evaluates robots.txt permissions, caching documents per origin
#[derive(Debug)]
pub struct RobotsChecker {
    client: Client,
    cache: Mutex<HashMap<String, CachedRobots>>,
}

impl RobotsChecker {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true when `user_agent` may fetch `url`
    pub async fn is_permitted(&self, user_agent: &str, url: &Url) -> bool {
        match self.evaluate(user_agent, url).await {
            Ok(true) => true,
            Ok(false) => {
                info!(url = %url, "Crawling denied by robots.txt");
                false
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Could not evaluate robots.txt, denying");
                false
            }
        }
    }

    async fn evaluate(&self, user_agent: &str, url: &Url) -> Result<bool> {
        let key = origin_key(url)?;
        let target = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        if let Some(entry) = self.cached(&key)? {
            return Ok(entry.is_permitted(user_agent, &target));
        }

        let robots = match self.fetch(url).await? {
            PolicyFetch::Document(robots) => robots,
            PolicyFetch::Missing(status) => {
                debug!(origin = %key, status, "No robots.txt, permitting");
                ParsedRobots::allow_all()
            }
            PolicyFetch::Unreachable(e) => {
                debug!(origin = %key, error = %e, "robots.txt unreachable, permitting");
                return Ok(true);
            }
        };

        let entry = CachedRobots::new(robots);
        let permitted = entry.is_permitted(user_agent, &target);
        self.cache
            .lock()
            .map_err(|_| ChapterError::Stage("robots cache lock poisoned".to_string()))?
            .insert(key, entry);
        Ok(permitted)
    }

    fn cached(&self, key: &str) -> Result<Option<CachedRobots>> {
        let cache = self
            .cache
            .lock()
            .map_err(|_| ChapterError::Stage("robots cache lock poisoned".to_string()))?;
        Ok(cache.get(key).filter(|entry| !entry.is_stale()).cloned())
    }

    async fn fetch(&self, url: &Url) -> Result<PolicyFetch> {
        let location = robots_url(url)?;
        debug!(url = %location, "Fetching robots.txt");

        let response = match self.client.get(location.clone()).send().await {
            Ok(response) => response,
            Err(e) => return Ok(PolicyFetch::Unreachable(e)),
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(PolicyFetch::Missing(status.as_u16()));
        }

        let body = response.text().await.map_err(|source| ChapterError::Http {
            url: location.to_string(),
            source,
        })?;
        Ok(PolicyFetch::Document(ParsedRobots::from_content(&body)))
    }
}
