//! The playback session data model.

use std::time::Duration;

use player_bridge::{ActiveMedia, MediaId, ProducerKind, SourceUrl};

/// One item's tenure in the playback slot.
///
/// Created when a producer requests playback of an item, replaced when a
/// different item becomes active, destroyed when playback is closed. The
/// controller owns the only mutable instance; everyone else sees it through
/// the published snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    /// The item occupying the slot.
    pub media: ActiveMedia,
    /// Which producer put it there.
    pub producer: ProducerKind,
    pub is_playing: bool,
    pub current_time: Duration,
    pub duration: Duration,
    /// Index into `candidate_sources` of the source the engine holds.
    ///
    /// Always less than `candidate_sources.len()`.
    pub active_source_index: usize,
    /// Resolved candidate URLs in failover order. Never empty.
    pub candidate_sources: Vec<SourceUrl>,
}

impl PlaybackSession {
    pub fn new(media: ActiveMedia, producer: ProducerKind, candidate_sources: Vec<SourceUrl>) -> Self {
        Self {
            media,
            producer,
            is_playing: false,
            current_time: Duration::ZERO,
            duration: Duration::ZERO,
            active_source_index: 0,
            candidate_sources,
        }
    }

    pub fn media_id(&self) -> MediaId {
        self.media.media_id()
    }

    /// The source currently assigned to the engine.
    pub fn active_source(&self) -> Option<&SourceUrl> {
        self.candidate_sources.get(self.active_source_index)
    }

    /// Whether failover has another candidate to try.
    pub fn has_next_source(&self) -> bool {
        self.active_source_index + 1 < self.candidate_sources.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use player_bridge::{AccountId, ContentId, TrackId, TrackRef};

    fn session_with_sources(count: usize) -> PlaybackSession {
        let track = TrackRef::new(
            TrackId::new(),
            ContentId::parse("bafy-audio").unwrap(),
            AccountId::new("0xowner"),
        );
        let sources = (0..count)
            .map(|i| SourceUrl::new(format!("https://gw{i}.example/bafy-audio")))
            .collect();
        PlaybackSession::new(ActiveMedia::from(track), ProducerKind::OnDemand, sources)
    }

    #[test]
    fn fresh_session_points_at_first_source() {
        let session = session_with_sources(3);
        assert!(!session.is_playing);
        assert_eq!(session.active_source_index, 0);
        assert_eq!(
            session.active_source().unwrap().as_str(),
            "https://gw0.example/bafy-audio"
        );
        assert!(session.has_next_source());
    }

    #[test]
    fn last_source_has_no_next() {
        let mut session = session_with_sources(2);
        session.active_source_index = 1;
        assert!(!session.has_next_source());
        assert!(session.active_source().is_some());
    }
}
