//! Continuous stream producer.
//!
//! The stream is a shared broadcast with its own schedule; this producer
//! joins the item currently on air at its live offset and then follows
//! schedule changes, launching each new item as it starts. It never takes
//! positions or skip requests from the listener.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use player_bridge::{ProducerKind, StreamFeed, StreamItem};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::launch::Launcher;
use crate::task::{arm, disarm};

/// Drives the playback slot from the stream schedule while active.
#[derive(Clone)]
pub(crate) struct StreamProducer {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    feed: Arc<dyn StreamFeed>,
    launcher: Launcher,
    follow_task: Mutex<Option<CancellationToken>>,
}

impl StreamProducer {
    pub(crate) fn new(feed: Arc<dyn StreamFeed>, launcher: Launcher) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                feed,
                launcher,
                follow_task: Mutex::new(None),
            }),
        }
    }

    /// Joins the broadcast and follows its schedule until stopped.
    ///
    /// Subscribes before reading the current item so a schedule change
    /// landing mid-join is queued rather than missed.
    pub(crate) async fn start(&self) -> Result<()> {
        let mut changes = self.inner.feed.subscribe().await?;

        if let Some(item) = self.inner.feed.current_item().await? {
            self.join(&item).await;
        } else {
            debug!("stream is not broadcasting; waiting for the schedule");
        }

        let token = arm(&self.inner.follow_task);
        let producer = self.clone();
        tokio::spawn(async move {
            loop {
                let item = tokio::select! {
                    _ = token.cancelled() => break,
                    item = changes.next_item() => item,
                };
                let Some(item) = item else {
                    info!("stream schedule feed closed");
                    break;
                };
                // A producer switch mid-launch abandons the launch.
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = producer.join(&item) => {}
                }
            }
        });
        Ok(())
    }

    /// Stops following the schedule. The arbitrator clears the slot.
    pub(crate) fn stop(&self) {
        disarm(&self.inner.follow_task);
    }

    /// Launches one scheduled item at its live offset.
    ///
    /// Launch failures do not stop the producer; the next schedule change
    /// gets a fresh attempt.
    async fn join(&self, item: &StreamItem) {
        let offset = item.live_offset(Utc::now());
        let start_at = (!offset.is_zero()).then_some(offset);

        if let Err(error) = self
            .inner
            .launcher
            .launch(item.media.clone(), ProducerKind::Stream, start_at, true)
            .await
        {
            warn!(media = %item.media.media_id(), %error, "failed to start stream item");
        }
    }
}

impl std::fmt::Debug for StreamProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamProducer")
            .field("following", &self.inner.follow_task.lock().is_some())
            .finish()
    }
}
