//! Navigation on a background task
//!
//! Lets an interactive caller keep its event loop running while a navigation
//! is in flight. Events arrive over a channel; the navigator is handed back
//! by [`NavigationTask::join`].

use crate::navigator::{ChapterNavigator, Navigation};
use crate::pipeline::{CacheEvent, CancelFlag};
use crate::{ChapterError, Result};
use futures::{pin_mut, StreamExt};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::warn;

/// A navigation running on its own tokio task
#[derive(Debug)]
pub struct NavigationTask {
    action: Navigation,
    events: UnboundedReceiver<CacheEvent>,
    cancel: CancelFlag,
    handle: JoinHandle<ChapterNavigator>,
}

impl NavigationTask {
    /// Starts `action` on a new task; must be called inside a tokio runtime
    pub fn spawn(mut navigator: ChapterNavigator, action: Navigation) -> Self {
        let cancel = navigator.cancel_flag();
        cancel.reset();

        let (sender, events) = unbounded_channel();
        let handle = tokio::spawn(async move {
            {
                let stream = navigator.run(action);
                pin_mut!(stream);
                while let Some(event) = stream.next().await {
                    let _ = sender.send(event);
                }
            }
            navigator
        });

        Self {
            action,
            events,
            cancel,
            handle,
        }
    }

    pub fn action(&self) -> Navigation {
        self.action
    }

    /// Next progress or terminal event; None once the navigation is over
    pub async fn next_event(&mut self) -> Option<CacheEvent> {
        self.events.recv().await
    }

    /// Asks the stages to stop between images; the navigation still settles
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Forced stop, best effort only
    ///
    /// Sets the cancellation flag and aborts the driving task at its next
    /// await point. Downloads already in flight finish in the background,
    /// then the stages discard their images; the next run on the same cache
    /// directory waits for them. The navigator is lost: `join` returns an
    /// error.
    pub fn abort(&self) {
        warn!(action = %self.action, "Aborting navigation");
        self.cancel.cancel();
        self.handle.abort();
    }

    /// Waits for the navigation to end and returns the navigator
    pub async fn join(self) -> Result<ChapterNavigator> {
        self.handle
            .await
            .map_err(|e| ChapterError::Stage(format!("navigation task ended abnormally: {}", e)))
    }
}
