//! Chapter navigation state machine
//!
//! `Idle -> Resolving -> Caching -> Settled(success)`. A navigation that
//! resolves no URL goes straight from `Resolving` to `Settled(false)` and
//! leaves the cache untouched. A failed navigation keeps the new chapter
//! value: the caller restores the last good chapter and reloads.

mod task;

pub use task::NavigationTask;

use crate::config::Config;
use crate::pipeline::{CacheEvent, CachePipeline, CancelFlag};
use crate::provider::{Provider, ProviderRegistry};
use crate::resolver::Resolver;
use crate::session::Session;
use crate::settings::SessionSettings;
use crate::url::extract_domain;
use crate::Result;
use async_stream::stream;
use futures::{pin_mut, Stream, StreamExt};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs under a search-based strategy that cache fewer images than this
/// blacklist the chapter's domain
pub const LOW_YIELD_THRESHOLD: usize = 5;

/// Where the navigator is in its current invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigatorState {
    Idle,
    Resolving,
    Caching,
    Settled(bool),
}

/// A navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Next,
    Previous,
    Reload,
}

impl fmt::Display for Navigation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Next => f.write_str("next"),
            Self::Previous => f.write_str("previous"),
            Self::Reload => f.write_str("reload"),
        }
    }
}

/// Drives resolution and caching for one session
pub struct ChapterNavigator {
    session: Session,
    providers: ProviderRegistry,
    resolver: Resolver,
    pipeline: Arc<CachePipeline>,
    cancel: CancelFlag,
    state: NavigatorState,
}

impl fmt::Debug for ChapterNavigator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChapterNavigator")
            .field("session", &self.session)
            .field("providers", &self.providers)
            .field("state", &self.state)
            .finish()
    }
}

impl ChapterNavigator {
    pub fn new(
        session: Session,
        providers: ProviderRegistry,
        resolver: Resolver,
        pipeline: Arc<CachePipeline>,
    ) -> Self {
        Self {
            session,
            providers,
            resolver,
            pipeline,
            cancel: CancelFlag::new(),
            state: NavigatorState::Idle,
        }
    }

    /// Wires a navigator from configuration; the resolver and pipeline share
    /// one HTTP client and robots.txt cache
    pub fn from_config(config: &Config, session: Session) -> Result<Self> {
        let pipeline = Arc::new(CachePipeline::from_config(config)?);
        let resolver = Resolver::new(
            pipeline.client().clone(),
            pipeline.robots().clone(),
            pipeline.user_agent(),
            &config.search,
        )?;
        let providers = ProviderRegistry::from_config(&config.providers)?;
        providers.get(&session.provider_id)?;
        Ok(Self::new(session, providers, resolver, pipeline))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn state(&self) -> NavigatorState {
        self.state
    }

    pub fn pipeline(&self) -> &Arc<CachePipeline> {
        &self.pipeline
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Flag that cooperatively stops the running navigation
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// The active provider
    pub fn provider(&self) -> Result<Arc<dyn Provider>> {
        self.providers.get(&self.session.provider_id)
    }

    /// Snapshot for the settings store
    pub fn settings(&self) -> SessionSettings {
        SessionSettings::from(&self.session)
    }

    pub fn next_chapter(&mut self) -> impl Stream<Item = CacheEvent> + Send + '_ {
        self.navigate(Navigation::Next)
    }

    pub fn previous_chapter(&mut self) -> impl Stream<Item = CacheEvent> + Send + '_ {
        self.navigate(Navigation::Previous)
    }

    pub fn reload_chapter(&mut self) -> impl Stream<Item = CacheEvent> + Send + '_ {
        self.navigate(Navigation::Reload)
    }

    /// Applies `action` and caches the resulting chapter
    ///
    /// Progress values from the pipeline are relayed unchanged and the
    /// stream ends with one `Finished`.
    pub fn navigate(&mut self, action: Navigation) -> impl Stream<Item = CacheEvent> + Send + '_ {
        self.cancel.reset();
        self.run(action)
    }

    /// [`Self::navigate`] without clearing a pending cancellation
    pub(crate) fn run(&mut self, action: Navigation) -> impl Stream<Item = CacheEvent> + Send + '_ {
        stream! {
            let rate = self.session.chapter_rate;
            match action {
                Navigation::Next => self.session.chapter = self.session.chapter.advance(rate),
                Navigation::Previous => self.session.chapter = self.session.chapter.retreat(rate),
                Navigation::Reload => {}
            }
            info!(
                action = %action,
                title = self.session.title.text(),
                chapter = %self.session.chapter,
                "Navigating"
            );
            self.state = NavigatorState::Resolving;

            let provider = match self.providers.get(&self.session.provider_id) {
                Ok(provider) => provider,
                Err(e) => {
                    error!(error = %e, "Cannot navigate without a provider");
                    self.state = NavigatorState::Settled(false);
                    yield CacheEvent::Progress(0);
                    yield CacheEvent::Finished(false);
                    return;
                }
            };

            let resolved = self.resolver.resolve(&self.session, provider.as_ref()).await;
            let url = match resolved {
                Some(url) => url,
                None => {
                    self.state = NavigatorState::Settled(false);
                    yield CacheEvent::Progress(0);
                    yield CacheEvent::Finished(false);
                    return;
                }
            };
            self.session.current_url = Some(url.clone());
            self.state = NavigatorState::Caching;

            let mut success = false;
            {
                let events = self
                    .pipeline
                    .clone()
                    .cache_chapter(provider, Some(url.clone()), self.cancel.clone());
                pin_mut!(events);
                while let Some(event) = events.next().await {
                    match event {
                        CacheEvent::Progress(value) => yield CacheEvent::Progress(value),
                        CacheEvent::Finished(ok) => success = ok,
                    }
                }
            }

            if success {
                self.check_yield(&url);
            }
            self.state = NavigatorState::Settled(success);
            info!(action = %action, chapter = %self.session.chapter, success, "Navigation settled");
            yield CacheEvent::Finished(success);
        }
    }

    /// Blacklists the domain of a search-found chapter that produced too
    /// few images
    fn check_yield(&mut self, url: &url::Url) {
        if !self.session.strategy.is_search_based() {
            return;
        }
        let cached = match self.pipeline.cached_images() {
            Ok(images) => images.len(),
            Err(e) => {
                warn!(error = %e, "Could not count cached images");
                return;
            }
        };
        if cached >= LOW_YIELD_THRESHOLD {
            return;
        }
        if let Some(domain) = extract_domain(url) {
            warn!(domain = %domain, images = cached, "Low image yield, blacklisting domain");
            self.session.blacklist.insert(&domain);
        }
    }

    /// Adds the domain of the last resolved chapter to the blacklist
    ///
    /// Returns the domain, or None when no chapter has been resolved.
    pub fn blacklist_current_url(&mut self) -> Option<String> {
        let domain = self.session.current_url.as_ref().and_then(extract_domain)?;
        self.session.blacklist.insert(&domain);
        Some(domain)
    }

    /// Series titles matching `text` on the active provider's site
    pub async fn search_titles(&self, text: &str) -> Result<Vec<String>> {
        let provider = self.provider()?;
        provider.search_titles(self.pipeline.client(), text).await
    }
}
