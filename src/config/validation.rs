use crate::config::types::{
    Config, DomainEntry, PipelineConfig, ProviderEntry, SearchConfig, SessionDefaults,
    UserAgentConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Strategy names accepted in `[session]`
const STRATEGIES: &[&str] = &["direct", "site-search", "google", "duckduckgo", "bing"];

/// Engine names accepted in `[search]`
const ENGINES: &[&str] = &["google", "duckduckgo", "bing"];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_pipeline_config(&config.pipeline)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_settings_config(&config.settings)?;
    validate_session_defaults(&config.session)?;
    validate_search_config(&config.search)?;
    validate_providers(&config.providers)?;
    validate_blacklist_domains(&config.blacklist)?;
    Ok(())
}

/// Validates pipeline configuration
fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.cache_dir.is_empty() {
        return Err(ConfigError::Validation(
            "cache_dir cannot be empty".to_string(),
        ));
    }

    if config.download_workers < 1 || config.download_workers > 64 {
        return Err(ConfigError::Validation(format!(
            "download_workers must be between 1 and 64, got {}",
            config.download_workers
        )));
    }

    if config.convert_workers < 1 || config.convert_workers > 32 {
        return Err(ConfigError::Validation(format!(
            "convert_workers must be between 1 and 32, got {}",
            config.convert_workers
        )));
    }

    if config.poll_interval_ms < 10 || config.poll_interval_ms > 5000 {
        return Err(ConfigError::Validation(format!(
            "poll_interval_ms must be between 10 and 5000, got {}ms",
            config.poll_interval_ms
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    // Validate contact URL
    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    // Validate contact email (basic validation)
    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates settings store configuration
fn validate_settings_config(config: &crate::config::types::SettingsConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the fallback session values
fn validate_session_defaults(session: &SessionDefaults) -> Result<(), ConfigError> {
    if !STRATEGIES.contains(&session.strategy.as_str()) {
        return Err(ConfigError::Validation(format!(
            "strategy must be one of {:?}, got '{}'",
            STRATEGIES, session.strategy
        )));
    }

    if !session.chapter.is_finite() || session.chapter < 0.0 {
        return Err(ConfigError::Validation(format!(
            "chapter must be a non-negative number, got {}",
            session.chapter
        )));
    }

    if !session.chapter_rate.is_finite() || session.chapter_rate <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "chapter_rate must be greater than zero, got {}",
            session.chapter_rate
        )));
    }

    Ok(())
}

/// Validates the external search configuration
fn validate_search_config(search: &SearchConfig) -> Result<(), ConfigError> {
    if !ENGINES.contains(&search.engine.as_str()) {
        return Err(ConfigError::Validation(format!(
            "engine must be one of {:?}, got '{}'",
            ENGINES, search.engine
        )));
    }

    if let Some(endpoint) = &search.endpoint {
        validate_http_url(endpoint, "search endpoint")?;
    }

    Ok(())
}

/// Validates provider entries
fn validate_providers(providers: &[ProviderEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for entry in providers {
        if entry.id.is_empty() {
            return Err(ConfigError::Validation(
                "provider id cannot be empty".to_string(),
            ));
        }

        if !seen.insert(entry.id.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "provider '{}' is declared more than once",
                entry.id
            )));
        }

        validate_http_url(&entry.base_url, "base-url")?;

        match entry.kind.as_str() {
            "madara" => {}
            "template" => match &entry.chapter_template {
                Some(template) if template.starts_with('/') => {}
                Some(template) => {
                    return Err(ConfigError::Validation(format!(
                        "chapter-template for '{}' must start with '/', got '{}'",
                        entry.id, template
                    )));
                }
                None => {
                    return Err(ConfigError::Validation(format!(
                        "provider '{}' of kind 'template' needs a chapter-template",
                        entry.id
                    )));
                }
            },
            other => {
                return Err(ConfigError::Validation(format!(
                    "provider '{}' has unknown kind '{}'",
                    entry.id, other
                )));
            }
        }
    }

    Ok(())
}

/// Validates that a string is an absolute http(s) URL
fn validate_http_url(value: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, value, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            what, value
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' has no host",
            what, value
        )));
    }

    Ok(())
}

/// Validates blacklist domain entries
fn validate_blacklist_domains(domains: &[DomainEntry]) -> Result<(), ConfigError> {
    for entry in domains {
        validate_domain_pattern(&entry.domain)?;
    }
    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    // Check if it's a wildcard pattern
    if let Some(domain) = pattern.strip_prefix("*.") {
        // Validate the base domain part
        validate_domain_string(domain)?;
    } else {
        // Regular domain
        validate_domain_string(pattern)?;
    }

    Ok(())
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    // Check for invalid characters
    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    // Check that it doesn't start or end with a dot or hyphen
    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    // Check for consecutive dots
    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    // Must contain at least one dot (e.g., example.com, not just "example")
    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    // Domain part should contain at least one dot
    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
