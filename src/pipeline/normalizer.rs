//! Conversion stage
//!
//! Consumes the hand-off channel, converts every download whose bytes are not
//! already PNG on at most `workers` blocking tasks, and once the fetcher
//! reports `Done` renames the results by page position to `001.png`,
//! `002.png`, ... A cancelled run discards its images instead.

use crate::pipeline::{percent, CancelFlag, Handoff, CANONICAL_EXTENSION};
use crate::Result;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

pub(crate) struct NormalizeStage {
    pub cache_dir: PathBuf,
    pub workers: usize,
    pub handoff: UnboundedReceiver<Handoff>,
    pub progress: UnboundedSender<u8>,
    pub cancel: CancelFlag,
}

/// Finished-image counter shared by the conversion tasks
struct Tally {
    finished: usize,
    total: usize,
}

fn record(tally: &Mutex<Tally>, progress: &UnboundedSender<u8>) {
    if let Ok(mut tally) = tally.lock() {
        tally.finished += 1;
        let _ = progress.send(percent(tally.finished, tally.total));
    }
}

impl NormalizeStage {
    /// Runs the stage; false when the hand-off channel closed without `Done`,
    /// a conversion task died, renaming failed, or the run was cancelled
    pub async fn run(mut self) -> bool {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let tally = Arc::new(Mutex::new(Tally {
            finished: 0,
            total: 0,
        }));
        let mut conversions: JoinSet<Option<(usize, PathBuf)>> = JoinSet::new();
        let mut ready: Vec<(usize, PathBuf)> = Vec::new();
        let mut completed = false;

        while let Some(message) = self.handoff.recv().await {
            match message {
                Handoff::Expect(total) => {
                    if let Ok(mut tally) = tally.lock() {
                        tally.total = total;
                    }
                }
                Handoff::Skipped(index) => {
                    debug!(index, "Image skipped by download stage");
                    record(&tally, &self.progress);
                }
                Handoff::Image { index, path } => {
                    if self.cancel.is_cancelled() {
                        let _ = tokio::fs::remove_file(&path).await;
                        record(&tally, &self.progress);
                        continue;
                    }
                    let semaphore = semaphore.clone();
                    let tally = tally.clone();
                    let progress = self.progress.clone();
                    conversions.spawn(async move {
                        let converted = match semaphore.acquire_owned().await {
                            Ok(_permit) => convert(index, path).await,
                            Err(_) => None,
                        };
                        record(&tally, &progress);
                        converted.map(|out| (index, out))
                    });
                }
                Handoff::Done => {
                    completed = true;
                    break;
                }
            }
        }

        let mut healthy = completed;
        if !completed {
            error!("Hand-off channel closed before the download stage finished");
        }

        while let Some(joined) = conversions.join_next().await {
            match joined {
                Ok(Some(converted)) => ready.push(converted),
                Ok(None) => {}
                Err(e) => {
                    error!(error = %e, "Conversion task aborted");
                    healthy = false;
                }
            }
        }

        // cancelled runs leave no numbered files behind
        if self.cancel.is_cancelled() {
            info!(images = ready.len(), "Conversion stage cancelled, discarding images");
            for (_, path) in ready {
                let _ = tokio::fs::remove_file(&path).await;
            }
            return false;
        }

        if let Err(e) = sequence(&self.cache_dir, ready) {
            error!(error = %e, "Could not name cached images");
            return false;
        }
        healthy
    }
}

/// Result of preparing one download
enum Prepared {
    /// The bytes already are PNG; the download is kept as is
    Kept,
    /// Decoded and written as `conv-NNN.png`
    Converted,
}

/// Brings one download to PNG
///
/// The format is sniffed from the bytes, not the file name, so a JPEG served
/// as `.png` is still converted. A file that cannot be decoded is removed and
/// dropped from the chapter.
async fn convert(index: usize, raw: PathBuf) -> Option<PathBuf> {
    let out = raw.with_file_name(format!("conv-{:03}.{}", index, CANONICAL_EXTENSION));
    let source = raw.clone();
    let target = out.clone();
    let converted = tokio::task::spawn_blocking(move || -> Result<Prepared> {
        let bytes = std::fs::read(&source)?;
        if matches!(image::guess_format(&bytes), Ok(ImageFormat::Png)) {
            return Ok(Prepared::Kept);
        }
        image::load_from_memory(&bytes)?.save_with_format(&target, ImageFormat::Png)?;
        Ok(Prepared::Converted)
    })
    .await;

    if let Ok(Ok(Prepared::Kept)) = converted {
        debug!(file = %raw.display(), "Image already PNG");
        return Some(raw);
    }

    let _ = tokio::fs::remove_file(&raw).await;
    match converted {
        Ok(Ok(_)) => {
            debug!(file = %out.display(), "Converted image");
            Some(out)
        }
        Ok(Err(e)) => {
            warn!(file = %raw.display(), error = %e, "Image conversion failed, skipping");
            let _ = tokio::fs::remove_file(&out).await;
            None
        }
        Err(e) => {
            warn!(file = %raw.display(), error = %e, "Conversion worker died, skipping");
            let _ = tokio::fs::remove_file(&out).await;
            None
        }
    }
}

/// Renames images to `001.png`... in page order
fn sequence(cache_dir: &Path, mut ready: Vec<(usize, PathBuf)>) -> Result<usize> {
    ready.sort_by_key(|(index, _)| *index);
    for (position, (_, path)) in ready.iter().enumerate() {
        let target = cache_dir.join(format!("{:03}.{}", position + 1, CANONICAL_EXTENSION));
        std::fs::rename(path, &target)?;
    }
    info!(images = ready.len(), "Chapter cached");
    Ok(ready.len())
}
