//! Session settings persistence
//!
//! Settings are read once at startup and written back after every
//! successful navigation and at shutdown.

mod schema;
mod sqlite;

pub use sqlite::SqliteSettings;

use crate::resolver::Strategy;
use crate::session::{Blacklist, Chapter, ChapterRate, Session};
use crate::Result;

/// Keys of the `settings` table
pub mod keys {
    pub const PROVIDER: &str = "provider";
    pub const STRATEGY: &str = "strategy";
    pub const TITLE: &str = "title";
    pub const CHAPTER: &str = "chapter";
    pub const CHAPTER_RATE: &str = "chapter_rate";
    pub const BLACKLIST: &str = "blacklist";
}

/// Persisted view of a [`Session`]
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub provider: String,
    pub strategy: String,
    pub title: String,
    pub chapter: f64,
    pub chapter_rate: f64,
    /// Comma-separated domains
    pub blacklist: String,
}

impl From<&Session> for SessionSettings {
    fn from(session: &Session) -> Self {
        Self {
            provider: session.provider_id.clone(),
            strategy: session.strategy.to_string(),
            title: session.title.text().to_string(),
            chapter: session.chapter.value(),
            chapter_rate: session.chapter_rate.value(),
            blacklist: session.blacklist.to_csv(),
        }
    }
}

impl SessionSettings {
    /// Overwrites the session's values with the stored ones
    ///
    /// Stored blacklist entries are added to those already in the session.
    /// Nothing is changed when any value is invalid.
    pub fn apply(&self, session: &mut Session) -> Result<()> {
        let chapter = Chapter::new(self.chapter)?;
        let chapter_rate = ChapterRate::new(self.chapter_rate)?;
        let strategy: Strategy = self.strategy.parse()?;

        session.title.set(self.title.clone());
        session.chapter = chapter;
        session.chapter_rate = chapter_rate;
        session.provider_id = self.provider.to_lowercase();
        session.strategy = strategy;
        for domain in Blacklist::from_csv(&self.blacklist).domains() {
            session.blacklist.insert(domain);
        }
        Ok(())
    }
}

/// Storage for session settings
pub trait SettingsStore {
    /// Returns the stored settings, or None when nothing was saved yet
    fn load(&self) -> Result<Option<SessionSettings>>;

    fn save(&mut self, settings: &SessionSettings) -> Result<()>;
}
