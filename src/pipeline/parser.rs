//! Image reference extraction from chapter pages

use scraper::{Html, Selector};
use url::Url;

/// Attributes that may hold an image location, in preference order
///
/// Lazy-loading themes leave a placeholder in `src` and the real location in
/// one of the `data-` attributes.
const SOURCE_ATTRIBUTES: [&str; 3] = ["data-src", "data-lazy-src", "src"];

/// Returns absolute image URLs in document order, without duplicates
pub fn extract_image_urls(html: &str, page_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("img") else {
        return Vec::new();
    };

    let mut urls: Vec<Url> = Vec::new();
    for element in document.select(&selector) {
        let source = SOURCE_ATTRIBUTES
            .iter()
            .filter_map(|attr| element.value().attr(attr))
            .map(str::trim)
            .find(|value| !value.is_empty() && !value.starts_with("data:"));

        let Some(url) = source.and_then(|value| page_url.join(value).ok()) else {
            continue;
        };
        if matches!(url.scheme(), "http" | "https") && !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

/// Last path segment of an image URL
pub fn image_file_name(url: &Url) -> Option<&str> {
    url.path_segments()?.last().filter(|name| !name.is_empty())
}
