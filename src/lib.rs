//! chapter-cache: a chapter acquisition pipeline for paginated image content
//!
//! This crate resolves the page that hosts a title's chapter, checks that the
//! page may be crawled, downloads and normalizes its images into a flat cache
//! directory, and reports combined progress to the caller as a stream.

pub mod config;
pub mod navigator;
pub mod pipeline;
pub mod provider;
pub mod resolver;
pub mod robots;
pub mod session;
pub mod settings;
pub mod url;

use thiserror::Error;

/// Main error type for chapter-cache operations
#[derive(Debug, Error)]
pub enum ChapterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid chapter value: {0}")]
    InvalidChapter(String),

    #[error("Invalid settings value for {key}: {value}")]
    InvalidSetting { key: String, value: String },

    #[error("Stage aborted: {0}")]
    Stage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for chapter-cache operations
pub type Result<T> = std::result::Result<T, ChapterError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use navigator::{ChapterNavigator, Navigation, NavigationTask, NavigatorState};
pub use pipeline::{CacheEvent, CachePipeline, CancelFlag};
pub use provider::{Provider, ProviderRegistry};
pub use resolver::{Resolver, Strategy};
pub use session::{Blacklist, Chapter, ChapterRate, Session, Title};
