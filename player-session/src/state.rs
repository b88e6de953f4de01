//! Shared playback snapshot.
//!
//! A single writer (the playback controller) publishes
//! [`PlaybackSnapshot`] through a `tokio::sync::watch` channel; any number
//! of read-only consumers hold a [`PlaybackStateHandle`]. Per-item widgets
//! compare the snapshot's id to their own to decide active styling, so the
//! snapshot changes on every timing tick and every play/pause/item change.

use player_bridge::MediaId;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Point-in-time view of the playback slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    /// Id of the item in the slot, `None` when idle.
    pub media_id: Option<MediaId>,
    pub current_time_secs: f64,
    pub duration_secs: f64,
    pub is_playing: bool,
}

impl PlaybackSnapshot {
    /// The idle snapshot.
    pub fn empty() -> Self {
        Self {
            media_id: None,
            current_time_secs: 0.0,
            duration_secs: 0.0,
            is_playing: false,
        }
    }

    /// Whether `id` is the item currently in the slot.
    pub fn is_active(&self, id: MediaId) -> bool {
        self.media_id == Some(id)
    }

    /// Playback progress in `[0.0, 1.0]`; `0.0` when no duration is known.
    pub fn progress(&self) -> f64 {
        if self.duration_secs > 0.0 {
            (self.current_time_secs / self.duration_secs).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Read-only subscription to the playback snapshot.
///
/// Cloning yields an independent cursor over the same stream; consumers
/// can never write back.
#[derive(Debug, Clone)]
pub struct PlaybackStateHandle {
    receiver: watch::Receiver<PlaybackSnapshot>,
}

impl PlaybackStateHandle {
    pub(crate) fn new(receiver: watch::Receiver<PlaybackSnapshot>) -> Self {
        Self { receiver }
    }

    /// The latest published snapshot.
    pub fn current(&self) -> PlaybackSnapshot {
        *self.receiver.borrow()
    }

    /// Waits until the snapshot changes.
    ///
    /// Returns `false` once the writer is gone.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Waits for a snapshot matching `predicate`, returning it.
    ///
    /// Returns `None` once the writer is gone.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&PlaybackSnapshot) -> bool,
    ) -> Option<PlaybackSnapshot> {
        self.receiver.wait_for(predicate).await.map(|s| *s).ok()
    }
}

/// Creates the snapshot channel, starting idle.
pub(crate) fn snapshot_channel() -> (watch::Sender<PlaybackSnapshot>, PlaybackStateHandle) {
    let (sender, receiver) = watch::channel(PlaybackSnapshot::empty());
    (sender, PlaybackStateHandle::new(receiver))
}

#[cfg(test)]
mod tests {
    use super::*;
    use player_bridge::TrackId;

    #[test]
    fn empty_snapshot_is_inactive_everywhere() {
        let snapshot = PlaybackSnapshot::empty();
        assert!(!snapshot.is_active(MediaId::Track(TrackId::new())));
        assert_eq!(snapshot.progress(), 0.0);
        assert!(!snapshot.is_playing);
    }

    #[test]
    fn progress_is_clamped() {
        let mut snapshot = PlaybackSnapshot::empty();
        snapshot.duration_secs = 100.0;
        snapshot.current_time_secs = 42.3;
        assert!((snapshot.progress() - 0.423).abs() < 1e-9);

        snapshot.current_time_secs = 250.0;
        assert_eq!(snapshot.progress(), 1.0);
    }

    #[tokio::test]
    async fn handle_observes_writes() {
        let (sender, mut handle) = snapshot_channel();
        assert_eq!(handle.current(), PlaybackSnapshot::empty());

        let id = MediaId::Track(TrackId::new());
        sender.send_replace(PlaybackSnapshot {
            media_id: Some(id),
            current_time_secs: 1.0,
            duration_secs: 10.0,
            is_playing: true,
        });

        assert!(handle.changed().await);
        let snapshot = handle.current();
        assert!(snapshot.is_active(id));
        assert!(snapshot.is_playing);
    }

    #[tokio::test]
    async fn clones_read_independently() {
        let (sender, handle) = snapshot_channel();
        let mut observer = handle.clone();

        sender.send_replace(PlaybackSnapshot {
            media_id: Some(MediaId::Track(TrackId::new())),
            current_time_secs: 0.0,
            duration_secs: 10.0,
            is_playing: true,
        });

        let seen = observer.wait_for(|s| s.is_playing).await;
        assert!(seen.is_some());
    }
}
