//! Titles and their URL-safe slugs

use unicode_normalization::UnicodeNormalization;

/// A free-text title together with its derived slug
///
/// The slug is recomputed whenever the text changes and is never stored on
/// its own.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Title {
    text: String,
    slug: String,
}

impl Title {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let slug = slugify(&text);
        Self { text, slug }
    }

    /// Replaces the text and recomputes the slug
    pub fn set(&mut self, text: impl Into<String>) {
        *self = Self::new(text);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// ASCII-folded text with everything but letters, digits, whitespace,
    /// `_` and `-` removed
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Lowercase, hyphen-joined slug as used in site paths (`solo-leveling`)
    pub fn path_slug(&self) -> String {
        self.slug
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join("-")
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Folds a title to ASCII and strips characters that are unsafe in URLs
pub fn slugify(text: &str) -> String {
    text.nfkd()
        .filter(char::is_ascii)
        .filter(|c| c.is_ascii_alphanumeric() || c.is_ascii_whitespace() || *c == '_' || *c == '-')
        .collect::<String>()
        .trim()
        .to_string()
}
