use serde::Deserialize;

/// Main configuration structure for chapter-cache
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub settings: SettingsConfig,
    #[serde(default)]
    pub session: SessionDefaults,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default, rename = "provider")]
    pub providers: Vec<ProviderEntry>,
    #[serde(default)]
    pub blacklist: Vec<DomainEntry>,
}

/// Caching pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Directory that holds the images of the displayed chapter
    #[serde(rename = "cache-dir")]
    pub cache_dir: String,

    /// Maximum number of simultaneous image downloads
    #[serde(rename = "download-workers", default = "default_download_workers")]
    pub download_workers: u32,

    /// Maximum number of simultaneous image conversions
    #[serde(rename = "convert-workers", default = "default_convert_workers")]
    pub convert_workers: u32,

    /// How often the progress aggregator polls both stages (milliseconds)
    #[serde(rename = "poll-interval-ms", default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_download_workers() -> u32 {
    10
}

fn default_convert_workers() -> u32 {
    4
}

fn default_poll_interval() -> u64 {
    100
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the client
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the client
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the client
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for client-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Settings store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsConfig {
    /// Path to the SQLite settings database
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Session values used when the settings store has nothing saved yet
#[derive(Debug, Clone, Deserialize)]
pub struct SessionDefaults {
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_strategy")]
    pub strategy: String,

    #[serde(default)]
    pub title: String,

    #[serde(default = "default_chapter")]
    pub chapter: f64,

    #[serde(rename = "chapter-rate", default = "default_chapter_rate")]
    pub chapter_rate: f64,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            strategy: default_strategy(),
            title: String::new(),
            chapter: default_chapter(),
            chapter_rate: default_chapter_rate(),
        }
    }
}

fn default_provider() -> String {
    "manhwaclan".to_string()
}

fn default_strategy() -> String {
    "site-search".to_string()
}

fn default_chapter() -> f64 {
    1.0
}

fn default_chapter_rate() -> f64 {
    1.0
}

/// External search engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Engine used when site search has nothing to offer
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Overrides the engine's public endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            endpoint: None,
        }
    }
}

fn default_engine() -> String {
    "duckduckgo".to_string()
}

/// A site provider registered under an id
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    /// Identity used by the settings store
    pub id: String,

    /// Provider family (`madara` or `template`)
    #[serde(default = "default_provider_kind")]
    pub kind: String,

    /// Scheme and host of the site, e.g. `https://manhwaclan.com`
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path template for the `template` kind
    #[serde(rename = "chapter-template", default)]
    pub chapter_template: Option<String>,
}

fn default_provider_kind() -> String {
    "madara".to_string()
}

/// Simple domain entry for the seed blacklist
#[derive(Debug, Clone, Deserialize)]
pub struct DomainEntry {
    /// Domain pattern (e.g., "example.com" or "*.example.com")
    pub domain: String,
}
