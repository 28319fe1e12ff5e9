//! Sites running the WordPress Madara manga theme

use crate::provider::{Provider, SeriesMatch};
use crate::session::{Chapter, Title};
use crate::{ChapterError, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

const AJAX_PATH: &str = "/wp-admin/admin-ajax.php";
const AJAX_ACTION: &str = "wp-manga-search-manga";

/// Madara layout: `/manga/<slug>/chapter-<dash>/`
///
/// Site search tries the theme's search results page first and falls back to
/// the AJAX autocomplete endpoint.
#[derive(Debug, Clone)]
pub struct MadaraProvider {
    id: String,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct AjaxResponse {
    #[serde(default)]
    data: Vec<AjaxEntry>,
}

#[derive(Debug, Deserialize)]
struct AjaxEntry {
    title: Option<String>,
    url: Option<String>,
}

impl MadaraProvider {
    pub fn new(id: impl Into<String>, base_url: Url) -> Self {
        Self {
            id: id.into().to_lowercase(),
            base_url,
        }
    }

    async fn search_page(&self, client: &Client, text: &str) -> Result<Vec<SeriesMatch>> {
        let mut url = self.base_url.join("/")?;
        url.query_pairs_mut()
            .append_pair("s", text)
            .append_pair("post_type", "wp-manga");

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
        Ok(parse_search_page(&body, &self.base_url))
    }

    async fn search_ajax(&self, client: &Client, text: &str) -> Result<Vec<SeriesMatch>> {
        let url = self.base_url.join(AJAX_PATH)?;
        let response = client
            .post(url.clone())
            .header("X-Requested-With", "XMLHttpRequest")
            .form(&[("action", AJAX_ACTION), ("title", text)])
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
        let parsed: AjaxResponse = serde_json::from_str(&body)?;
        Ok(parsed
            .data
            .into_iter()
            .filter_map(|entry| {
                let url = self.base_url.join(entry.url?.as_str()).ok()?;
                Some(SeriesMatch {
                    title: entry.title?.trim().to_string(),
                    url,
                })
            })
            .collect())
    }
}

#[async_trait]
impl Provider for MadaraProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn chapter_url(&self, title: &Title, chapter: Chapter) -> Option<Url> {
        let slug = title.path_slug();
        if slug.is_empty() {
            return None;
        }
        self.base_url
            .join(&format!("/manga/{}/chapter-{}/", slug, chapter.dash()))
            .ok()
    }

    fn supports_site_search(&self) -> bool {
        true
    }

    async fn search_series(&self, client: &Client, text: &str) -> Result<Vec<SeriesMatch>> {
        let matches = match self.search_page(client, text).await {
            Ok(matches) => matches,
            Err(e) => {
                warn!(provider = %self.id, error = %e, "Search page failed, trying AJAX search");
                Vec::new()
            }
        };
        if !matches.is_empty() {
            debug!(provider = %self.id, count = matches.len(), "Search page results");
            return Ok(matches);
        }
        self.search_ajax(client, text).await
    }

    fn series_chapter_url(&self, series: &Url, chapter: Chapter) -> Option<Url> {
        let mut series = series.clone();
        if !series.path().ends_with('/') {
            let path = format!("{}/", series.path());
            series.set_path(&path);
        }
        series.join(&format!("chapter-{}/", chapter.dash())).ok()
    }
}

/// Extracts series links from a Madara search results page
fn parse_search_page(html: &str, base_url: &Url) -> Vec<SeriesMatch> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("div.c-tabs-item div.row.c-tabs-item__content a[title][href]")
    else {
        return Vec::new();
    };

    let mut matches: Vec<SeriesMatch> = Vec::new();
    for element in document.select(&selector) {
        let (Some(title), Some(href)) = (element.value().attr("title"), element.value().attr("href"))
        else {
            continue;
        };
        let Ok(url) = base_url.join(href.trim()) else {
            continue;
        };
        if matches.iter().any(|m| m.url == url) {
            continue;
        }
        matches.push(SeriesMatch {
            title: title.trim().to_string(),
            url,
        });
    }
    matches
}
