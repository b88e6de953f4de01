//! Playback Engine Abstraction
//!
//! The single audio engine handle driven by the playback controller.

use crate::media::SourceUrl;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors reported by the playback engine.
///
/// The controller's failover and retry behavior is driven entirely by the
/// classification methods below, so engine implementations should map their
/// native failures onto the closest variant rather than inventing strings.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Playback was refused pending a user gesture (autoplay policy).
    #[error("Playback requires a user gesture: {0}")]
    PermissionDenied(String),

    /// The source could not be decoded or its format is not supported.
    #[error("Unsupported or undecodable media: {0}")]
    UnsupportedFormat(String),

    /// The request was aborted, typically by a rapid source swap racing the
    /// engine's own load pipeline.
    #[error("Playback request aborted: {0}")]
    TransientAbort(String),

    /// An operation was issued with no media loaded.
    #[error("No media loaded")]
    NotLoaded,

    /// The engine failed for a reason outside the taxonomy above.
    #[error("Engine failure: {0}")]
    Failed(String),
}

impl EngineError {
    /// Returns `true` if playback needs a user gesture before it can start.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, EngineError::PermissionDenied(_))
    }

    /// Returns `true` if the source itself cannot be played and the next
    /// candidate should be tried.
    pub fn is_format_error(&self) -> bool {
        matches!(self, EngineError::UnsupportedFormat(_))
    }

    /// Returns `true` if the same call can be retried after a short delay.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::TransientAbort(_))
    }
}

/// Coarse engine state as reported by [`PlaybackEngine::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    /// No media loaded
    Idle,
    /// Media assigned, metadata not yet available
    Loading,
    /// Actively producing audio
    Playing,
    /// Media loaded, output suspended
    Paused,
    /// Media played through to its end
    Ended,
}

impl EngineStatus {
    /// Whether the engine currently holds loaded media
    pub fn has_media(&self) -> bool {
        !matches!(self, EngineStatus::Idle)
    }
}

/// Metadata available once a source has loaded far enough to play.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    /// Total duration of the loaded media
    pub duration: Duration,
}

/// The audio engine the controller drives.
///
/// Exactly one engine handle exists per player and it is exclusively owned
/// by the playback controller; implementations may therefore assume calls
/// are serialized by their single caller.
///
/// Engines reset their volume and mute state when a new source is assigned,
/// so the controller re-applies both after every [`load`](Self::load).
///
/// # Example
///
/// ```ignore
/// use player_bridge::engine::PlaybackEngine;
///
/// async fn restart(engine: &dyn PlaybackEngine) -> Result<(), player_bridge::EngineError> {
///     engine.seek(std::time::Duration::ZERO).await?;
///     engine.play().await
/// }
/// ```
#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    /// Assign a source and wait for its metadata.
    ///
    /// Resolves once the engine knows the media duration, which is the
    /// earliest point a preserved position can be restored after a source
    /// swap. Loading replaces any previously assigned source.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be fetched or parsed far
    /// enough to produce metadata.
    async fn load(&self, source: &SourceUrl) -> Result<MediaInfo, EngineError>;

    /// Begin or resume playback of the loaded source.
    ///
    /// # Errors
    ///
    /// Rejections carry the classification the controller acts on:
    /// [`EngineError::PermissionDenied`], [`EngineError::UnsupportedFormat`]
    /// or [`EngineError::TransientAbort`].
    async fn play(&self) -> Result<(), EngineError>;

    /// Suspend playback, keeping the source and position.
    async fn pause(&self) -> Result<(), EngineError>;

    /// Move the playhead to `position`.
    ///
    /// Callers clamp into `[0, duration]` before issuing the seek.
    async fn seek(&self, position: Duration) -> Result<(), EngineError>;

    /// Current playhead position.
    async fn position(&self) -> Result<Duration, EngineError>;

    /// Set output volume in `[0.0, 1.0]`.
    async fn set_volume(&self, volume: f32) -> Result<(), EngineError>;

    /// Mute or unmute output without touching the volume setting.
    async fn set_muted(&self, muted: bool) -> Result<(), EngineError>;

    /// Coarse engine state.
    async fn status(&self) -> EngineStatus;

    /// Take the most recent asynchronous engine failure, clearing it.
    ///
    /// Engines surface mid-playback source failures here (network loss,
    /// decoder giving up partway through a file) since the call that
    /// started playback has long returned. The controller samples this
    /// alongside [`status`](Self::status) and fails over on anything
    /// fatal; each failure is reported at most once.
    async fn take_error(&self) -> Option<EngineError>;

    /// Drop the loaded source and return to [`EngineStatus::Idle`].
    async fn unload(&self) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_mutually_exclusive() {
        let denied = EngineError::PermissionDenied("autoplay".into());
        assert!(denied.is_permission_denied());
        assert!(!denied.is_format_error());
        assert!(!denied.is_transient());

        let format = EngineError::UnsupportedFormat("no decoder".into());
        assert!(format.is_format_error());
        assert!(!format.is_permission_denied());
        assert!(!format.is_transient());

        let abort = EngineError::TransientAbort("load interrupted".into());
        assert!(abort.is_transient());
        assert!(!abort.is_permission_denied());
        assert!(!abort.is_format_error());
    }

    #[test]
    fn generic_failures_are_fatal_for_the_source() {
        let failed = EngineError::Failed("device lost".into());
        assert!(!failed.is_permission_denied());
        assert!(!failed.is_format_error());
        assert!(!failed.is_transient());
    }

    #[test]
    fn status_reports_media_presence() {
        assert!(!EngineStatus::Idle.has_media());
        assert!(EngineStatus::Loading.has_media());
        assert!(EngineStatus::Playing.has_media());
        assert!(EngineStatus::Paused.has_media());
        assert!(EngineStatus::Ended.has_media());
    }
}
