//! Session-layer error types.

use player_access::PlayDecision;
use player_bridge::{DirectoryError, EngineError};
use thiserror::Error;

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Errors surfaced by the playback session layer.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// Source resolution produced nothing to load. Playback is refused
    /// rather than handing the engine an empty source.
    #[error("No playable sources for the requested item")]
    NoSources,

    /// Every candidate source failed. Terminal for the item; the matching
    /// event fires exactly once.
    #[error("All {attempted} candidate sources failed")]
    SourcesExhausted { attempted: usize },

    /// The engine refused to start without a user gesture. The host shows
    /// a tap-to-play affordance and calls play again; the source is kept.
    #[error("Playback requires a user gesture")]
    PermissionDenied,

    /// The access gate denied the play attempt.
    #[error("Playback not permitted: {reason:?}")]
    AccessDenied { reason: PlayDecision },

    /// An operation needs a loaded session and none exists.
    #[error("Nothing is loaded")]
    NoActiveSession,

    /// Track skipping was requested while the live stream is the active
    /// producer; the stream decides its own progression.
    #[error("The live stream controls its own progression")]
    StreamDriven,

    /// The supplied configuration failed validation.
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl PlaybackError {
    /// Whether the host should show a tap-to-play prompt and retry.
    pub fn requires_gesture(&self) -> bool {
        matches!(self, PlaybackError::PermissionDenied)
    }

    /// Whether playback of the current item is over for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackError::SourcesExhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gesture_and_terminal_classification() {
        assert!(PlaybackError::PermissionDenied.requires_gesture());
        assert!(!PlaybackError::PermissionDenied.is_terminal());

        let exhausted = PlaybackError::SourcesExhausted { attempted: 3 };
        assert!(exhausted.is_terminal());
        assert!(!exhausted.requires_gesture());
    }

    #[test]
    fn engine_errors_convert() {
        let error: PlaybackError = EngineError::NotLoaded.into();
        assert!(matches!(error, PlaybackError::Engine(EngineError::NotLoaded)));
    }
}
