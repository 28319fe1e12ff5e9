/// Checks whether a domain matches a blacklist pattern
///
/// `example.com` matches only itself. `*.example.com` matches the bare
/// domain and any subdomain at any depth.
///
/// # Examples
///
/// ```
/// use chapter_cache::url::matches_wildcard;
///
/// assert!(matches_wildcard("247manga.com", "247manga.com"));
/// assert!(!matches_wildcard("247manga.com", "www.247manga.com"));
/// assert!(matches_wildcard("*.mangakakalot.tv", "ww6.mangakakalot.tv"));
/// assert!(matches_wildcard("*.mangakakalot.tv", "mangakakalot.tv"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .is_some_and(|head| head.ends_with('.'))
        }
        None => candidate == pattern,
    }
}
