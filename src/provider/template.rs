//! Sites addressed by a fixed chapter path template

use crate::provider::Provider;
use crate::session::{Chapter, Title};
use async_trait::async_trait;
use url::Url;

/// Builds chapter URLs from a path template
///
/// Placeholders: `{slug}` (lowercase hyphenated title), `{chapter}` and
/// `{chapter_dash}`. Has no site search.
#[derive(Debug, Clone)]
pub struct TemplateProvider {
    id: String,
    base_url: Url,
    template: String,
}

impl TemplateProvider {
    pub fn new(id: impl Into<String>, base_url: Url, template: impl Into<String>) -> Self {
        Self {
            id: id.into().to_lowercase(),
            base_url,
            template: template.into(),
        }
    }

    fn render(&self, title: &Title, chapter: Chapter) -> String {
        self.template
            .replace("{slug}", &title.path_slug())
            .replace("{chapter_dash}", &chapter.dash())
            .replace("{chapter}", &chapter.to_string())
    }
}

#[async_trait]
impl Provider for TemplateProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn chapter_url(&self, title: &Title, chapter: Chapter) -> Option<Url> {
        if self.template.contains("{slug}") && title.path_slug().is_empty() {
            return None;
        }
        self.base_url.join(&self.render(title, chapter)).ok()
    }
}
