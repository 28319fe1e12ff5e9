//! SQLite-backed settings store

use crate::settings::schema::initialize_schema;
use crate::settings::{keys, SessionSettings, SettingsStore};
use crate::{ChapterError, Result};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Settings kept in a `settings(key, value)` table
pub struct SqliteSettings {
    conn: Connection,
}

impl SqliteSettings {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn read_all(&self) -> Result<HashMap<String, String>> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM settings")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut values = HashMap::new();
        for row in rows {
            let (key, value): (String, String) = row?;
            values.insert(key, value);
        }
        Ok(values)
    }
}

fn take(values: &mut HashMap<String, String>, key: &str) -> Result<String> {
    values.remove(key).ok_or_else(|| ChapterError::InvalidSetting {
        key: key.to_string(),
        value: "<missing>".to_string(),
    })
}

fn parse_number(key: &str, value: String) -> Result<f64> {
    value.trim().parse().map_err(|_| ChapterError::InvalidSetting {
        key: key.to_string(),
        value,
    })
}

impl SettingsStore for SqliteSettings {
    fn load(&self) -> Result<Option<SessionSettings>> {
        let mut values = self.read_all()?;
        if values.is_empty() {
            return Ok(None);
        }

        let chapter = take(&mut values, keys::CHAPTER)?;
        let chapter_rate = take(&mut values, keys::CHAPTER_RATE)?;
        Ok(Some(SessionSettings {
            provider: take(&mut values, keys::PROVIDER)?,
            strategy: take(&mut values, keys::STRATEGY)?,
            title: take(&mut values, keys::TITLE)?,
            chapter: parse_number(keys::CHAPTER, chapter)?,
            chapter_rate: parse_number(keys::CHAPTER_RATE, chapter_rate)?,
            blacklist: values.remove(keys::BLACKLIST).unwrap_or_default(),
        }))
    }

    fn save(&mut self, settings: &SessionSettings) -> Result<()> {
        let chapter = settings.chapter.to_string();
        let chapter_rate = settings.chapter_rate.to_string();
        let entries = [
            (keys::PROVIDER, settings.provider.as_str()),
            (keys::STRATEGY, settings.strategy.as_str()),
            (keys::TITLE, settings.title.as_str()),
            (keys::CHAPTER, chapter.as_str()),
            (keys::CHAPTER_RATE, chapter_rate.as_str()),
            (keys::BLACKLIST, settings.blacklist.as_str()),
        ];

        let tx = self.conn.transaction()?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
        }
        tx.commit()?;
        debug!(chapter = %settings.chapter, title = %settings.title, "Saved settings");
        Ok(())
    }
}
