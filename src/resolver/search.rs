//! External search engines
//!
//! Queries are sent as `GET <endpoint>?q=<query>` and result pages are parsed
//! for `(url, page title)` pairs in rank order.

use crate::session::Chapter;
use crate::{ChapterError, Result};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Supported general-purpose search engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchEngineKind {
    Google,
    DuckDuckGo,
    Bing,
}

impl SearchEngineKind {
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Google => "https://www.google.com/search",
            Self::DuckDuckGo => "https://html.duckduckgo.com/html/",
            Self::Bing => "https://www.bing.com/search",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::DuckDuckGo => "duckduckgo",
            Self::Bing => "bing",
        }
    }
}

impl fmt::Display for SearchEngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchEngineKind {
    type Err = ChapterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "duckduckgo" => Ok(Self::DuckDuckGo),
            "bing" => Ok(Self::Bing),
            _ => Err(ChapterError::InvalidSetting {
                key: "search engine".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// One organic search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: Url,
    pub title: String,
}

/// Query variants from most to least specific
pub fn build_queries(title: &str, chapter: Chapter, site: &str) -> Vec<String> {
    vec![
        format!("manga \"{title}\" \"chapter {chapter}\" site:{site} -tapas"),
        format!("manga \"{title}\" chapter {chapter} site:{site} -tapas"),
        format!("manga {title} chapter {chapter} site:{site} -tapas"),
        format!("manga {title} site:{site}"),
        format!("manga site:{site}"),
    ]
}

/// Runs one query and returns hits in rank order
pub async fn search(
    client: &Client,
    engine: SearchEngineKind,
    endpoint: &Url,
    query: &str,
) -> Result<Vec<SearchHit>> {
    let mut url = endpoint.clone();
    url.query_pairs_mut().append_pair("q", query);

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|source| ChapterError::Http {
            url: url.to_string(),
            source,
        })?;
    if !response.status().is_success() {
        return Err(ChapterError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }
    let body = response.text().await?;
    Ok(parse_results(engine, &body, endpoint))
}

/// Parses a result page for the given engine
pub fn parse_results(engine: SearchEngineKind, html: &str, endpoint: &Url) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    match engine {
        SearchEngineKind::DuckDuckGo => collect_anchors(&document, "a.result__a", endpoint, "uddg"),
        SearchEngineKind::Bing => collect_anchors(&document, "li.b_algo h2 a", endpoint, ""),
        SearchEngineKind::Google => parse_google(&document, endpoint),
    }
}

fn collect_anchors(document: &Html, selector: &str, endpoint: &Url, redirect_param: &str) -> Vec<SearchHit> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let url = resolve_result(href, endpoint, redirect_param)?;
            Some(SearchHit {
                url,
                title: element_text(&anchor),
            })
        })
        .collect()
}

fn parse_google(document: &Html, endpoint: &Url) -> Vec<SearchHit> {
    let (Ok(anchors), Ok(heading)) = (Selector::parse("a[href]"), Selector::parse("h3")) else {
        return Vec::new();
    };
    document
        .select(&anchors)
        .filter_map(|anchor| {
            let title = element_text(&anchor.select(&heading).next()?);
            let href = anchor.value().attr("href")?;
            let url = resolve_result(href, endpoint, "q")?;
            Some(SearchHit { url, title })
        })
        .collect()
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves a result link, unwrapping the engine's redirect wrapper
fn resolve_result(href: &str, endpoint: &Url, redirect_param: &str) -> Option<Url> {
    let url = endpoint.join(href.trim()).ok()?;

    let wrapped = (!redirect_param.is_empty())
        .then(|| {
            url.query_pairs()
                .find(|(key, _)| key == redirect_param)
                .map(|(_, value)| value.into_owned())
        })
        .flatten();
    let target = match wrapped {
        Some(wrapped) => Url::parse(&wrapped).ok()?,
        None => url,
    };

    matches!(target.scheme(), "http" | "https").then_some(target)
}
