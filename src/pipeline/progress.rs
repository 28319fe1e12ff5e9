//! Progress aggregation for a caching run

use crate::pipeline::fetcher::FetchStage;
use crate::pipeline::normalizer::NormalizeStage;
use crate::pipeline::{CacheEvent, CachePipeline, CancelFlag};
use crate::provider::Provider;
use async_stream::stream;
use futures::Stream;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::OwnedMutexGuard;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use url::Url;

/// Latest value seen from one stage
struct StageProgress {
    receiver: UnboundedReceiver<u8>,
    current: u8,
}

impl StageProgress {
    /// Drains pending values and returns how far the stage moved
    fn drain(&mut self) -> u32 {
        let mut delta = 0;
        while let Ok(value) = self.receiver.try_recv() {
            delta += u32::from(value.saturating_sub(self.current));
            self.current = self.current.max(value);
        }
        delta
    }
}

/// Stops the stages of a run whose event stream is dropped before the end
struct AbandonGuard {
    stages: CancelFlag,
    armed: bool,
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!("Caching run abandoned, cancelling its stages");
            self.stages.cancel();
        }
    }
}

/// Runs a stage while it holds the cache directory
async fn holding(dir: Arc<OwnedMutexGuard<()>>, stage: impl Future<Output = bool>) -> bool {
    let ok = stage.await;
    drop(dir);
    ok
}

async fn stage_result(name: &str, handle: JoinHandle<bool>) -> bool {
    handle.await.unwrap_or_else(|e| {
        error!(stage = name, error = %e, "Stage panicked");
        false
    })
}

impl CachePipeline {
    /// Caches the chapter at `url` into the cache directory
    ///
    /// Yields `Progress(0)`, then a combined value on every poll, then one
    /// `Finished`. Without a URL, or when robots.txt denies it, the stream is
    /// just `Progress(0)`, `Finished(false)` and the cache is left alone.
    ///
    /// Dropping the stream early cancels the run; its stages discard their
    /// images, and the next run on this pipeline waits for them to stop
    /// before clearing the cache directory.
    pub fn cache_chapter(
        self: Arc<Self>,
        provider: Arc<dyn Provider>,
        url: Option<Url>,
        cancel: CancelFlag,
    ) -> impl Stream<Item = CacheEvent> + Send + 'static {
        stream! {
            let url = match url {
                Some(url) => url,
                None => {
                    warn!("No chapter URL to cache");
                    yield CacheEvent::Progress(0);
                    yield CacheEvent::Finished(false);
                    return;
                }
            };

            if !self.robots.is_permitted(&self.user_agent, &url).await {
                warn!(url = %url, "Not caching, robots.txt denies access");
                yield CacheEvent::Progress(0);
                yield CacheEvent::Finished(false);
                return;
            }

            // a previous run's stages may still be winding down in this directory
            let dir = Arc::new(self.run_lock.clone().lock_owned().await);

            if let Err(e) = self.clear_cache() {
                error!(error = %e, "Could not clear cache directory");
                yield CacheEvent::Progress(0);
                yield CacheEvent::Finished(false);
                return;
            }

            let (handoff_tx, handoff_rx) = unbounded_channel();
            let (fetch_tx, fetch_rx) = unbounded_channel();
            let (normalize_tx, normalize_rx) = unbounded_channel();

            // stages get their own flag so a later reset of `cancel` cannot revive them
            let stages = CancelFlag::new();
            if cancel.is_cancelled() {
                stages.cancel();
            }
            let mut guard = AbandonGuard { stages: stages.clone(), armed: true };

            let fetch = tokio::spawn(holding(
                dir.clone(),
                FetchStage {
                    client: self.client.clone(),
                    provider,
                    page_url: url.clone(),
                    cache_dir: self.cache_dir.clone(),
                    workers: self.download_workers,
                    handoff: handoff_tx,
                    progress: fetch_tx,
                    cancel: stages.clone(),
                }
                .run(),
            ));
            let normalize = tokio::spawn(holding(
                dir.clone(),
                NormalizeStage {
                    cache_dir: self.cache_dir.clone(),
                    workers: self.convert_workers,
                    handoff: handoff_rx,
                    progress: normalize_tx,
                    cancel: stages.clone(),
                }
                .run(),
            ));
            drop(dir);

            yield CacheEvent::Progress(0);

            let mut fetched = StageProgress { receiver: fetch_rx, current: 0 };
            let mut normalized = StageProgress { receiver: normalize_rx, current: 0 };
            let mut combined: u32 = 0;

            loop {
                if cancel.is_cancelled() {
                    stages.cancel();
                }
                // observed before draining so no value sent before exit is missed
                let stages_finished = fetch.is_finished() && normalize.is_finished();
                combined += fetched.drain() + normalized.drain();
                yield CacheEvent::Progress((combined / 2).min(100) as u8);

                if stages_finished {
                    break;
                }
                tokio::time::sleep(self.poll_interval).await;
            }

            let fetch_ok = stage_result("download", fetch).await;
            let normalize_ok = stage_result("convert", normalize).await;
            guard.armed = false;
            let success = fetch_ok && normalize_ok;
            info!(url = %url, success, "Caching run finished");
            yield CacheEvent::Finished(success);
        }
    }
}
