//! Chapter URL resolution
//!
//! A [`Strategy`] picks how a `(title, chapter, provider)` triple becomes a
//! page URL. Every candidate passes the same acceptance checks before it is
//! returned. Failing to find one is not an error: `resolve` returns `None`.

mod candidate;
mod search;

pub use search::{build_queries, parse_results, SearchEngineKind, SearchHit};

use crate::config::SearchConfig;
use crate::provider::Provider;
use crate::robots::RobotsChecker;
use crate::session::Session;
use crate::{ChapterError, Result};
use candidate::title_matches;
use reqwest::Client;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use url::Url;

/// How a chapter URL is found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Build the URL from the provider's path template
    Direct,
    /// Look the series up with the site's own search, then compose the URL
    SiteSearch,
    /// Scan a general search engine's results
    ExternalSearch(SearchEngineKind),
}

impl Strategy {
    /// Strategies that discover URLs rather than construct them
    pub fn is_search_based(&self) -> bool {
        !matches!(self, Self::Direct)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::SiteSearch => f.write_str("site-search"),
            Self::ExternalSearch(engine) => write!(f, "{}", engine),
        }
    }
}

impl FromStr for Strategy {
    type Err = ChapterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "site-search" => Ok(Self::SiteSearch),
            other => other
                .parse::<SearchEngineKind>()
                .map(Self::ExternalSearch)
                .map_err(|_| ChapterError::InvalidSetting {
                    key: "strategy".to_string(),
                    value: s.to_string(),
                }),
        }
    }
}

/// Resolves chapter URLs for a session
///
/// Series found by site search are remembered per provider and title for
/// the lifetime of the resolver.
#[derive(Debug)]
pub struct Resolver {
    client: Client,
    robots: Arc<RobotsChecker>,
    user_agent: String,
    fallback_engine: SearchEngineKind,
    endpoint: Option<Url>,
    abbreviations: Mutex<HashMap<(String, String), Url>>,
}

impl Resolver {
    pub fn new(
        client: Client,
        robots: Arc<RobotsChecker>,
        user_agent: impl Into<String>,
        search: &SearchConfig,
    ) -> Result<Self> {
        let endpoint = search.endpoint.as_deref().map(Url::parse).transpose()?;
        Ok(Self {
            client,
            robots,
            user_agent: user_agent.into(),
            fallback_engine: search.engine.parse()?,
            endpoint,
            abbreviations: Mutex::new(HashMap::new()),
        })
    }

    /// Finds the page URL of the session's current chapter
    pub async fn resolve(&self, session: &Session, provider: &dyn Provider) -> Option<Url> {
        debug!(
            provider = provider.id(),
            strategy = %session.strategy,
            title = session.title.text(),
            chapter = %session.chapter,
            "Resolving chapter URL"
        );

        let resolved = match session.strategy {
            Strategy::Direct => self.resolve_direct(session, provider).await,
            Strategy::SiteSearch => self.resolve_site_search(session, provider).await,
            Strategy::ExternalSearch(engine) => {
                self.resolve_external(session, provider, engine).await
            }
        };

        match &resolved {
            Some(url) => info!(url = %url, "Resolved chapter URL"),
            None => info!(
                title = session.title.text(),
                chapter = %session.chapter,
                "No chapter URL found"
            ),
        }
        resolved
    }

    async fn resolve_direct(&self, session: &Session, provider: &dyn Provider) -> Option<Url> {
        let url = provider.chapter_url(&session.title, session.chapter)?;
        self.accept_candidate(&url, &session.blacklist)
            .await
            .then_some(url)
    }

    async fn resolve_site_search(&self, session: &Session, provider: &dyn Provider) -> Option<Url> {
        if !provider.supports_site_search() {
            debug!(provider = provider.id(), "No site search, using external search");
            return self
                .resolve_external(session, provider, self.fallback_engine)
                .await;
        }

        let Some(series) = self.abbreviation(session, provider).await else {
            return self
                .resolve_external(session, provider, self.fallback_engine)
                .await;
        };
        let url = provider.series_chapter_url(&series, session.chapter)?;
        self.accept_candidate(&url, &session.blacklist)
            .await
            .then_some(url)
    }

    /// The series landing page for the session's title, searched once
    async fn abbreviation(&self, session: &Session, provider: &dyn Provider) -> Option<Url> {
        let key = (provider.id().to_string(), session.title.text().to_string());
        let cached = self
            .abbreviations
            .lock()
            .ok()
            .and_then(|cache| cache.get(&key).cloned());
        if cached.is_some() {
            return cached;
        }

        let matches = match provider
            .search_series(&self.client, session.title.text())
            .await
        {
            Ok(matches) => matches,
            Err(e) => {
                warn!(provider = provider.id(), error = %e, "Site search failed");
                return None;
            }
        };
        let series = matches.into_iter().next()?.url;
        debug!(series = %series, "Site search found series");
        if let Ok(mut cache) = self.abbreviations.lock() {
            cache.insert(key, series.clone());
        }
        Some(series)
    }

    async fn resolve_external(
        &self,
        session: &Session,
        provider: &dyn Provider,
        engine: SearchEngineKind,
    ) -> Option<Url> {
        let endpoint = match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => Url::parse(engine.default_endpoint()).ok()?,
        };
        let title = session.title.text();
        let mut tried: HashSet<Url> = HashSet::new();

        for query in build_queries(title, session.chapter, &provider.base_domain()) {
            let hits = match search::search(&self.client, engine, &endpoint, &query).await {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(engine = %engine, query = %query, error = %e, "Search query failed");
                    continue;
                }
            };
            debug!(engine = %engine, query = %query, hits = hits.len(), "Search results");

            for hit in hits {
                if !title_matches(&hit.title, title, session.chapter) || !tried.insert(hit.url.clone()) {
                    continue;
                }
                if self.accept_candidate(&hit.url, &session.blacklist).await {
                    return Some(hit.url);
                }
            }
        }
        None
    }
}
