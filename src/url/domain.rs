use crate::{UrlError, UrlResult};
use url::Url;

/// Extracts the lowercase host of a URL
///
/// Ports are not part of the domain; blacklist entries name hosts only.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use chapter_cache::url::extract_domain;
///
/// let url = Url::parse("https://ManhwaClan.com/manga/solo-leveling/").unwrap();
/// assert_eq!(extract_domain(&url), Some("manhwaclan.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Key identifying the origin of a URL: `scheme://host[:port]`
///
/// Two URLs with the same key share one robots.txt document.
pub fn origin_key(url: &Url) -> UrlResult<String> {
    let host = extract_domain(url).ok_or(UrlError::MissingDomain)?;
    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// Location of the crawl policy governing `url`
///
/// The policy lives at `/robots.txt` on the same scheme, host and port.
pub fn robots_url(url: &Url) -> UrlResult<Url> {
    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }
    url.join("/robots.txt")
        .map_err(|e| UrlError::Malformed(e.to_string()))
}
