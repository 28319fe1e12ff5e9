//! Session state owned by the chapter navigator
//!
//! A [`Session`] is an explicit context object: every navigator gets its own,
//! so concurrent sessions and tests never share a blacklist or chapter.

mod blacklist;
mod chapter;
mod title;

pub use blacklist::Blacklist;
pub use chapter::{Chapter, ChapterRate};
pub use title::{slugify, Title};

use crate::config::Config;
use crate::resolver::Strategy;
use crate::Result;
use url::Url;

/// Mutable navigation state for one viewer session
#[derive(Debug, Clone)]
pub struct Session {
    pub title: Title,
    pub chapter: Chapter,
    pub chapter_rate: ChapterRate,
    pub provider_id: String,
    pub strategy: Strategy,
    pub blacklist: Blacklist,
    /// URL of the most recently resolved chapter page
    pub current_url: Option<Url>,
}

impl Session {
    pub fn new(
        title: Title,
        chapter: Chapter,
        chapter_rate: ChapterRate,
        provider_id: impl Into<String>,
        strategy: Strategy,
    ) -> Self {
        Self {
            title,
            chapter,
            chapter_rate,
            provider_id: provider_id.into().to_lowercase(),
            strategy,
            blacklist: Blacklist::new(),
            current_url: None,
        }
    }

    /// Builds a session from the `[session]` defaults and `[[blacklist]]`
    /// seeds of the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let defaults = &config.session;
        let mut session = Self::new(
            Title::new(defaults.title.clone()),
            Chapter::new(defaults.chapter)?,
            ChapterRate::new(defaults.chapter_rate)?,
            defaults.provider.clone(),
            defaults.strategy.parse()?,
        );
        session.blacklist = config.blacklist.iter().map(|e| &e.domain).collect();
        Ok(session)
    }
}
