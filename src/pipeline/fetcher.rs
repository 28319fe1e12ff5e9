//! Download stage
//!
//! Retrieves the chapter page, keeps the images the provider accepts, and
//! downloads them with at most `workers` requests in flight. Each image is
//! written as `raw-NNN.<ext>` (page position, zero-based) and handed to the
//! normalizer as soon as it lands.

use crate::pipeline::parser::{extract_image_urls, image_file_name};
use crate::pipeline::{percent, CancelFlag, Handoff};
use crate::provider::Provider;
use crate::{ChapterError, Result};
use reqwest::header::REFERER;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

pub(crate) struct FetchStage {
    pub client: Client,
    pub provider: Arc<dyn Provider>,
    pub page_url: Url,
    pub cache_dir: PathBuf,
    pub workers: usize,
    pub handoff: UnboundedSender<Handoff>,
    pub progress: UnboundedSender<u8>,
    pub cancel: CancelFlag,
}

/// Completed-download counter; progress is sent while it is held so values
/// arrive in order
struct Completion {
    finished: Mutex<usize>,
    total: usize,
    progress: UnboundedSender<u8>,
}

impl Completion {
    fn record(&self) {
        if let Ok(mut finished) = self.finished.lock() {
            *finished += 1;
            let _ = self.progress.send(percent(*finished, self.total));
        }
    }
}

impl FetchStage {
    /// Runs the stage; false when the page could not be retrieved, a download
    /// task died, or the run was cancelled
    pub async fn run(self) -> bool {
        let handoff = self.handoff.clone();
        let result = self.download_all().await;
        let _ = handoff.send(Handoff::Done);
        match result {
            Ok(ok) => ok,
            Err(e) => {
                error!(error = %e, "Download stage failed");
                false
            }
        }
    }

    async fn download_all(self) -> Result<bool> {
        let images = self.accepted_images().await?;
        let total = images.len();
        info!(url = %self.page_url, images = total, "Downloading chapter images");

        let _ = self.handoff.send(Handoff::Expect(total));
        if total == 0 {
            return Ok(true);
        }

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let completion = Arc::new(Completion {
            finished: Mutex::new(0),
            total,
            progress: self.progress.clone(),
        });
        let mut tasks = JoinSet::new();

        for (index, image_url) in images.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let completion = completion.clone();
            let client = self.client.clone();
            let handoff = self.handoff.clone();
            let cancel = self.cancel.clone();
            let referer = self.page_url.to_string();
            let path = self.cache_dir.join(raw_file_name(index, &image_url));

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    let _ = handoff.send(Handoff::Skipped(index));
                    completion.record();
                    return;
                };
                if cancel.is_cancelled() {
                    let _ = handoff.send(Handoff::Skipped(index));
                    completion.record();
                    return;
                }

                match download(&client, &image_url, &referer, &path).await {
                    Ok(bytes) => {
                        debug!(url = %image_url, bytes, "Downloaded image");
                        let _ = handoff.send(Handoff::Image { index, path });
                    }
                    Err(e) => {
                        warn!(url = %image_url, error = %e, "Image download failed, skipping");
                        let _ = tokio::fs::remove_file(&path).await;
                        let _ = handoff.send(Handoff::Skipped(index));
                    }
                }
                completion.record();
            });
        }

        let mut healthy = true;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Download task aborted");
                healthy = false;
            }
        }

        if self.cancel.is_cancelled() {
            info!("Download stage cancelled");
            return Ok(false);
        }
        Ok(healthy)
    }

    /// Retrieves the page and lists the image URLs the provider accepts
    async fn accepted_images(&self) -> Result<Vec<Url>> {
        let response = self
            .client
            .get(self.page_url.clone())
            .send()
            .await
            .map_err(|source| ChapterError::Http {
                url: self.page_url.to_string(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(ChapterError::Status {
                url: self.page_url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let body = response.text().await?;

        let images: Vec<Url> = extract_image_urls(&body, &self.page_url)
            .into_iter()
            .filter(|url| {
                image_file_name(url).is_some_and(|name| self.provider.accepts_image(name))
            })
            .collect();
        Ok(images)
    }
}

/// `raw-NNN.<ext>` with the extension taken from the image URL
fn raw_file_name(index: usize, url: &Url) -> String {
    let ext = image_file_name(url)
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "img".to_string());
    format!("raw-{:03}.{}", index, ext)
}

async fn download(client: &Client, url: &Url, referer: &str, path: &Path) -> Result<usize> {
    let response = client
        .get(url.clone())
        .header(REFERER, referer)
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
    let bytes = response.bytes().await?;
    tokio::fs::write(path, &bytes).await?;
    Ok(bytes.len())
}
