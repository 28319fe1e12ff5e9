//! Site providers
//!
//! A provider knows how one site lays out its chapter URLs, how to search it
//! for a series, and which page images are chapter content. Providers are
//! registered in a [`ProviderRegistry`] under a lowercase id.

mod madara;
mod template;

pub use madara::MadaraProvider;
pub use template::TemplateProvider;

use crate::config::ProviderEntry;
use crate::session::{Chapter, Title};
use crate::url::extract_domain;
use crate::{ChapterError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Id and base URL of the provider registered when the config names none
pub const DEFAULT_PROVIDER_ID: &str = "manhwaclan";
pub const DEFAULT_PROVIDER_URL: &str = "https://manhwaclan.com";

/// A series found by a site's own search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesMatch {
    pub title: String,
    /// Landing page of the series; chapter pages live beneath it
    pub url: Url,
}

/// URL construction and search for one site
#[async_trait]
pub trait Provider: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    /// Scheme and host of the site
    fn base_url(&self) -> &Url;

    fn base_domain(&self) -> String {
        extract_domain(self.base_url()).unwrap_or_default()
    }

    /// Builds the chapter page URL from the title slug alone
    fn chapter_url(&self, title: &Title, chapter: Chapter) -> Option<Url>;

    /// Whether [`Provider::search_series`] queries the site
    fn supports_site_search(&self) -> bool {
        false
    }

    /// Searches the site for series matching `text`, best match first
    async fn search_series(&self, _client: &Client, _text: &str) -> Result<Vec<SeriesMatch>> {
        Ok(Vec::new())
    }

    /// Composes a chapter URL beneath a series landing page
    fn series_chapter_url(&self, _series: &Url, _chapter: Chapter) -> Option<Url> {
        None
    }

    /// Lists series titles matching `text`
    async fn search_titles(&self, client: &Client, text: &str) -> Result<Vec<String>> {
        let matches = self.search_series(client, text).await?;
        Ok(matches.into_iter().map(|m| m.title).collect())
    }

    /// Whether an image with this file name is chapter content
    fn accepts_image(&self, file_name: &str) -> bool {
        is_content_image_name(file_name)
    }
}

/// Minimum stem length for a hexadecimal hash file name
const MIN_HASH_STEM: usize = 8;

/// Accepts `NNN.ext` and `<hex hash>.ext` file names
///
/// Logos, banners and ads on chapter pages use descriptive names and are
/// rejected.
pub fn is_content_image_name(file_name: &str) -> bool {
    let Some((stem, ext)) = file_name.rsplit_once('.') else {
        return false;
    };
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) || stem.is_empty() {
        return false;
    }
    stem.chars().all(|c| c.is_ascii_digit())
        || (stem.len() >= MIN_HASH_STEM && stem.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Lookup table of providers keyed by lowercase id
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds providers from `[[provider]]` entries
    ///
    /// The default Madara provider is registered when `entries` is empty.
    pub fn from_config(entries: &[ProviderEntry]) -> Result<Self> {
        let mut registry = Self::new();

        if entries.is_empty() {
            let base = Url::parse(DEFAULT_PROVIDER_URL)?;
            registry.register(Arc::new(MadaraProvider::new(DEFAULT_PROVIDER_ID, base)));
            return Ok(registry);
        }

        for entry in entries {
            let base = Url::parse(&entry.base_url)?;
            let provider: Arc<dyn Provider> = match entry.kind.as_str() {
                "madara" => Arc::new(MadaraProvider::new(&entry.id, base)),
                "template" => {
                    let template = entry.chapter_template.clone().ok_or_else(|| {
                        ChapterError::UnknownProvider(format!(
                            "{} (template provider without chapter-template)",
                            entry.id
                        ))
                    })?;
                    Arc::new(TemplateProvider::new(&entry.id, base, template))
                }
                other => {
                    return Err(ChapterError::UnknownProvider(format!(
                        "{} (kind '{}')",
                        entry.id, other
                    )))
                }
            };
            registry.register(provider);
        }

        Ok(registry)
    }

    /// Registers a provider, replacing any with the same id
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        let id = provider.id().to_lowercase();
        debug!(provider = %id, base = %provider.base_url(), "Registered provider");
        self.providers.insert(id, provider);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Provider>> {
        self.providers
            .get(&id.to_lowercase())
            .cloned()
            .ok_or_else(|| ChapterError::UnknownProvider(id.to_string()))
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
