//! Catalog and Stream Schedule Abstractions
//!
//! Track metadata lookup and the continuous stream's schedule feed.

use crate::media::{AccountId, ActiveMedia, ContentId, TrackId, TrackRef};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors from catalog and schedule lookups.
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// No track with the given id exists in the catalog.
    #[error("Track not found: {0}")]
    NotFound(TrackId),

    /// The catalog or schedule endpoint could not be reached.
    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

/// Full catalog record for a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDetails {
    /// Catalog id
    pub id: TrackId,
    /// Track title
    pub title: String,
    /// Artist display name
    pub artist: String,
    /// Content identifier of the audio payload
    pub audio_content_id: ContentId,
    /// Content identifier of the cover image, when one exists
    pub cover_content_id: Option<ContentId>,
    /// Identity of the track owner
    pub owner: AccountId,
    /// Token ticker for tracks with an attached token
    pub ticker: Option<String>,
    /// Global play count across all listeners (display only; quota uses the
    /// per-listener count from the play-count ledger)
    pub play_count: u64,
}

impl TrackDetails {
    /// The playback-slot reference for this record
    pub fn to_ref(&self) -> TrackRef {
        TrackRef {
            id: self.id,
            audio_content_id: self.audio_content_id.clone(),
            cover_content_id: self.cover_content_id.clone(),
            owner: self.owner.clone(),
            ticker: self.ticker.clone(),
        }
    }
}

/// Track metadata provider.
#[async_trait]
pub trait TrackDirectory: Send + Sync {
    /// Look up the catalog record for `id`.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::NotFound`] for unknown ids,
    /// [`DirectoryError::Unavailable`] when the catalog cannot be reached.
    async fn track(&self, id: &TrackId) -> Result<TrackDetails, DirectoryError>;
}

/// One scheduled item on the continuous stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamItem {
    /// The media currently on air
    pub media: ActiveMedia,
    /// Wall-clock instant the item started
    pub started_at: DateTime<Utc>,
}

impl StreamItem {
    /// Offset into the item a listener joining at `now` should start from.
    ///
    /// Clock skew can put `started_at` in the future; that clamps to zero.
    pub fn live_offset(&self, now: DateTime<Utc>) -> Duration {
        (now - self.started_at).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Schedule feed of the continuous stream.
///
/// The stream is a shared broadcast: every listener hears the same item at
/// the same offset, which is why joining mid-item seeks to the live offset
/// instead of starting from zero.
#[async_trait]
pub trait StreamFeed: Send + Sync {
    /// The item currently on air, if the stream is broadcasting.
    async fn current_item(&self) -> Result<Option<StreamItem>, DirectoryError>;

    /// Subscribe to schedule changes.
    ///
    /// Implementations emit an item whenever the stream moves to the next
    /// scheduled entry. Dropping the returned stream ends the subscription.
    async fn subscribe(&self) -> Result<Box<dyn StreamItemStream>, DirectoryError>;
}

/// Stream of schedule changes.
#[async_trait]
pub trait StreamItemStream: Send {
    /// Next schedule change, or `None` once the feed has closed.
    async fn next_item(&mut self) -> Option<StreamItem>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::AdId;

    #[test]
    fn live_offset_measures_time_since_start() {
        let started = Utc::now() - chrono::Duration::seconds(90);
        let item = StreamItem {
            media: ActiveMedia::Ad(crate::media::AdRef::new(
                AdId::new(),
                ContentId::parse("bafyad").unwrap(),
                AccountId::new("0xsponsor"),
            )),
            started_at: started,
        };

        let offset = item.live_offset(Utc::now());
        assert!(offset >= Duration::from_secs(89) && offset <= Duration::from_secs(91));
    }

    #[test]
    fn live_offset_clamps_future_starts_to_zero() {
        let item = StreamItem {
            media: ActiveMedia::Ad(crate::media::AdRef::new(
                AdId::new(),
                ContentId::parse("bafyad").unwrap(),
                AccountId::new("0xsponsor"),
            )),
            started_at: Utc::now() + chrono::Duration::seconds(30),
        };

        assert_eq!(item.live_offset(Utc::now()), Duration::ZERO);
    }

    #[test]
    fn track_details_project_to_slot_reference() {
        let details = TrackDetails {
            id: TrackId::new(),
            title: "Glass Harbor".into(),
            artist: "Vera Lum".into(),
            audio_content_id: ContentId::parse("bafyaudio").unwrap(),
            cover_content_id: Some(ContentId::parse("bafycover").unwrap()),
            owner: AccountId::new("0xartist"),
            ticker: Some("GLASS".into()),
            play_count: 12_041,
        };

        let track_ref = details.to_ref();
        assert_eq!(track_ref.id, details.id);
        assert_eq!(track_ref.audio_content_id, details.audio_content_id);
        assert_eq!(track_ref.ticker.as_deref(), Some("GLASS"));
    }
}
