//! Chapter caching pipeline
//!
//! A caching run clears the cache directory, then runs two stages at once:
//! the fetcher downloads the page's images on a bounded pool of download
//! tasks, and the normalizer converts each finished download to PNG on a
//! separate bounded pool of blocking tasks. Finished downloads reach the
//! normalizer over a FIFO hand-off channel that ends with [`Handoff::Done`].
//! Each stage reports its own `0..=100` progress; the aggregator in
//! [`CachePipeline::cache_chapter`] merges them into one stream.

mod fetcher;
mod normalizer;
mod parser;
mod progress;

pub use parser::{extract_image_urls, image_file_name};

use crate::config::{Config, UserAgentConfig};
use crate::robots::RobotsChecker;
use crate::Result;
use reqwest::Client;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Canonical extension of cached images
pub const CANONICAL_EXTENSION: &str = "png";

/// One item of a caching run's progress stream
///
/// A stream yields `Progress` values and ends with exactly one `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    /// Combined download and conversion progress, `0..=100`
    Progress(u8),
    /// The run is over; true when both stages succeeded
    Finished(bool),
}

/// Cooperative cancellation shared with the stages of a run
///
/// Stages check the flag between images. Work already in flight completes.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears the flag so the next run can start
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Messages from the fetcher to the normalizer
#[derive(Debug)]
enum Handoff {
    /// Number of images the fetcher will report on; sent before any image
    Expect(usize),
    /// A finished download at its page position
    Image { index: usize, path: PathBuf },
    /// A download that failed and will not arrive
    Skipped(usize),
    /// No more messages follow
    Done,
}

/// Percentage of `done` out of `total`, rounded to nearest
fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = done.min(total);
    ((200 * done + total) / (2 * total)) as u8
}

/// Builds the HTTP client shared by resolution, robots checks and downloads
pub fn build_http_client(config: &UserAgentConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Downloads and normalizes chapter images into the cache directory
#[derive(Debug)]
pub struct CachePipeline {
    client: Client,
    robots: Arc<RobotsChecker>,
    user_agent: String,
    cache_dir: PathBuf,
    download_workers: usize,
    convert_workers: usize,
    poll_interval: Duration,
    /// Held by a run's stages for as long as they touch the cache directory;
    /// shared by every pipeline using the same directory
    run_lock: Arc<tokio::sync::Mutex<()>>,
}

impl CachePipeline {
    pub fn new(
        client: Client,
        robots: Arc<RobotsChecker>,
        user_agent: impl Into<String>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        let cache_dir = cache_dir.into();
        Self {
            client,
            robots,
            user_agent: user_agent.into(),
            run_lock: directory_lock(&cache_dir),
            cache_dir,
            download_workers: 10,
            convert_workers: 4,
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Builds the client, robots checker and pipeline described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_http_client(&config.user_agent)?;
        let robots = Arc::new(RobotsChecker::new(client.clone()));
        Ok(Self::new(
            client,
            robots,
            config.user_agent.header_value(),
            &config.pipeline.cache_dir,
        )
        .with_workers(
            config.pipeline.download_workers as usize,
            config.pipeline.convert_workers as usize,
        )
        .with_poll_interval(Duration::from_millis(config.pipeline.poll_interval_ms)))
    }

    /// Sets the pool sizes; each is at least one
    pub fn with_workers(mut self, download_workers: usize, convert_workers: usize) -> Self {
        self.download_workers = download_workers.max(1);
        self.convert_workers = convert_workers.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn robots(&self) -> &Arc<RobotsChecker> {
        &self.robots
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Removes everything in the cache directory, creating it if missing
    pub fn clear_cache(&self) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir)?;
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
        }
        debug!(dir = %self.cache_dir.display(), "Cleared cache directory");
        Ok(())
    }

    /// Cached chapter images (`NNN.png`) in display order
    pub fn cached_images(&self) -> Result<Vec<PathBuf>> {
        let mut images = Vec::new();
        if !self.cache_dir.exists() {
            return Ok(images);
        }
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if is_sequence_name(&path) {
                images.push(path);
            }
        }
        images.sort();
        Ok(images)
    }
}

/// The process-wide lock for `dir`
fn directory_lock(dir: &Path) -> Arc<tokio::sync::Mutex<()>> {
    static LOCKS: OnceLock<StdMutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>> =
        OnceLock::new();
    let mut locks = LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    locks.entry(dir.to_path_buf()).or_default().clone()
}

/// Matches `NNN.png`
fn is_sequence_name(path: &Path) -> bool {
    let (Some(stem), Some(ext)) = (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|s| s.to_str()),
    ) else {
        return false;
    };
    ext == CANONICAL_EXTENSION && stem.len() >= 3 && stem.chars().all(|c| c.is_ascii_digit())
}
