//! # Event Bus System
//!
//! Event-driven backbone of the playback core, built on
//! `tokio::sync::broadcast`. Gating decisions, source failovers, and
//! playback transitions all surface here as typed events, so the host UI
//! and the session layer react to the same stream instead of sharing
//! boolean flags.
//!
//! ## Overview
//!
//! - **Event Types**: Strongly-typed enum hierarchies per domain
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//! - **Subscription Management**: Multiple subscribers listen independently
//!
//! ## Usage
//!
//! ```rust
//! use player_runtime::events::{AccessEvent, EventBus, PlayerEvent};
//! use player_bridge::{MediaId, TrackId};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut sub = bus.subscribe();
//!
//! let media_id = MediaId::Track(TrackId::new());
//! bus.emit(PlayerEvent::Access(AccessEvent::PreviewExpired { media_id })).ok();
//!
//! let received = sub.recv().await.unwrap();
//! assert!(matches!(received, PlayerEvent::Access(_)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! `tokio::sync::broadcast` produces two receive errors:
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events. Non-fatal;
//!   keep receiving.
//! - **`RecvError::Closed`**: all senders dropped, shutdown signal.

use player_bridge::{MediaId, ProducerKind, TrackId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that fall behind by more than this receive
/// `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum PlayerEvent {
    /// Playback lifecycle events
    Playback(PlaybackEvent),
    /// Listen-access policy events
    Access(AccessEvent),
    /// Source resolution and failover events
    Source(SourceEvent),
}

impl PlayerEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            PlayerEvent::Playback(e) => e.description(),
            PlayerEvent::Access(e) => e.description(),
            PlayerEvent::Source(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            PlayerEvent::Source(SourceEvent::SourcesExhausted { .. }) => EventSeverity::Error,
            PlayerEvent::Source(SourceEvent::FailedOver { .. }) => EventSeverity::Warning,
            PlayerEvent::Playback(PlaybackEvent::PermissionRequired { .. }) => {
                EventSeverity::Warning
            }
            PlayerEvent::Access(AccessEvent::PreviewExpired { .. }) => EventSeverity::Warning,
            PlayerEvent::Access(AccessEvent::LimitReached { .. }) => EventSeverity::Warning,
            PlayerEvent::Access(AccessEvent::RecordDeferred { .. }) => EventSeverity::Warning,
            PlayerEvent::Playback(PlaybackEvent::Started { .. }) => EventSeverity::Info,
            PlayerEvent::Playback(PlaybackEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events describing the playback lifecycle.
///
/// Continuous position updates are not events; they flow through the shared
/// playback snapshot. Only discrete transitions appear here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// Playback started for a freshly admitted item.
    Started {
        /// Id of the item that started.
        media_id: MediaId,
    },
    /// Playback paused.
    Paused {
        /// Id of the paused item.
        media_id: MediaId,
        /// Playhead when paused, in seconds.
        position_secs: f64,
    },
    /// Playback resumed after a pause.
    Resumed {
        /// Id of the resumed item.
        media_id: MediaId,
        /// Playhead when resumed, in seconds.
        position_secs: f64,
    },
    /// The session was closed and the slot cleared.
    Stopped {
        /// Id of the item that was active.
        media_id: MediaId,
    },
    /// The item played through to its natural end.
    Completed {
        /// Id of the completed item.
        media_id: MediaId,
    },
    /// The engine refused to start without a user gesture; the host should
    /// show a tap-to-play affordance and re-issue play.
    PermissionRequired {
        /// Id of the item awaiting a gesture.
        media_id: MediaId,
    },
    /// A different producer took over the playback slot.
    ProducerActivated {
        /// The producer now driving output.
        producer: ProducerKind,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Completed { .. } => "Item completed",
            PlaybackEvent::PermissionRequired { .. } => "User gesture required",
            PlaybackEvent::ProducerActivated { .. } => "Producer switched",
        }
    }
}

// ============================================================================
// Access Events
// ============================================================================

/// Events from the listen-access gate.
///
/// `PreviewExpired` and `LimitReached` are deliberately distinct: the host
/// shows a login call-to-action for the former and a purchase
/// call-to-action for the latter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum AccessEvent {
    /// The anonymous preview window ran out while playing.
    PreviewExpired {
        /// Id of the item whose preview expired.
        media_id: MediaId,
    },
    /// The free-play quota is exhausted and the listener owns no stake.
    LimitReached {
        /// Id of the gated item.
        media_id: MediaId,
        /// Plays the ledger has recorded.
        play_count: u32,
        /// The free-play allowance.
        max_free_plays: u32,
    },
    /// A play was recorded against the quota.
    PlayRecorded {
        /// The recorded track.
        track_id: TrackId,
    },
    /// Recording failed; the record flag was re-armed so the next play
    /// session retries instead of losing the count.
    RecordDeferred {
        /// The track whose record failed.
        track_id: TrackId,
        /// Ledger failure message.
        message: String,
    },
    /// The gate re-evaluated its inputs.
    Updated {
        /// Whether the listener currently counts as an owner.
        is_owner: bool,
        /// Free plays left (meaningless for owners).
        remaining_plays: u32,
        /// True when a ledger read failed and the gate is failing open.
        degraded: bool,
    },
}

impl AccessEvent {
    fn description(&self) -> &str {
        match self {
            AccessEvent::PreviewExpired { .. } => "Anonymous preview expired",
            AccessEvent::LimitReached { .. } => "Free-play limit reached",
            AccessEvent::PlayRecorded { .. } => "Play recorded",
            AccessEvent::RecordDeferred { .. } => "Play record deferred",
            AccessEvent::Updated { .. } => "Access state updated",
        }
    }
}

// ============================================================================
// Source Events
// ============================================================================

/// Events from source resolution and failover.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum SourceEvent {
    /// Candidate sources were resolved for an item.
    Resolved {
        /// Id of the item.
        media_id: MediaId,
        /// Number of candidate URLs produced.
        candidate_count: usize,
    },
    /// A fatal source error moved playback to the next candidate.
    FailedOver {
        /// Id of the item.
        media_id: MediaId,
        /// Index of the failed candidate.
        from_index: usize,
        /// Index now active.
        to_index: usize,
        /// Position carried across the swap, in seconds.
        position_secs: f64,
    },
    /// Every candidate failed; playback for this item is over.
    ///
    /// Emitted exactly once per candidate list.
    SourcesExhausted {
        /// Id of the item.
        media_id: MediaId,
        /// Number of candidates attempted.
        attempted: usize,
    },
}

impl SourceEvent {
    fn description(&self) -> &str {
        match self {
            SourceEvent::Resolved { .. } => "Sources resolved",
            SourceEvent::FailedOver { .. } => "Failed over to next source",
            SourceEvent::SourcesExhausted { .. } => "All sources exhausted",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
///
/// # Example
///
/// ```rust
/// use player_runtime::events::{EventBus, PlayerEvent, PlaybackEvent};
/// use player_bridge::{MediaId, TrackId};
///
/// # #[tokio::main]
/// # async fn main() {
/// let bus = EventBus::new(100);
/// let mut subscriber = bus.subscribe();
///
/// let event = PlayerEvent::Playback(PlaybackEvent::Started {
///     media_id: MediaId::Track(TrackId::new()),
/// });
/// bus.emit(event).ok();
/// # }
/// ```
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events buffered per subscriber
    ///   before it starts lagging.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error when there are no active subscribers. Emitting into an empty
    /// bus is not a fault; callers typically `.ok()` the result.
    pub fn emit(&self, event: PlayerEvent) -> Result<usize, SendError<PlayerEvent>> {
        tracing::debug!(
            event = event.description(),
            severity = ?event.severity(),
            "player event"
        );
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all
    /// future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&PlayerEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with filtering.
///
/// # Example
///
/// ```rust
/// use player_runtime::events::{EventBus, EventStream, PlayerEvent};
///
/// let bus = EventBus::new(100);
/// let access_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, PlayerEvent::Access(_)));
/// # let _ = access_only;
/// ```
pub struct EventStream {
    receiver: Receiver<PlayerEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<PlayerEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&PlayerEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// Skips events that don't match the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n`
    /// events, `RecvError::Closed` once all senders are gone.
    pub async fn recv(&mut self) -> Result<PlayerEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching event is currently available.
    pub fn try_recv(&mut self) -> Option<Result<PlayerEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn track_event() -> (MediaId, PlayerEvent) {
        let media_id = MediaId::Track(TrackId::new());
        let event = PlayerEvent::Playback(PlaybackEvent::Started { media_id });
        (media_id, event)
    }

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        let (_, event) = track_event();

        // Should error when no subscribers
        assert!(bus.emit(event).is_err());
    }

    #[tokio::test]
    async fn test_event_emission_with_subscribers() {
        let bus = EventBus::new(10);
        let mut sub = bus.subscribe();
        let (_, event) = track_event();

        let result = bus.emit(event.clone());
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), 1);

        let received = sub.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let media_id = MediaId::Track(TrackId::new());
        let event = PlayerEvent::Source(SourceEvent::FailedOver {
            media_id,
            from_index: 0,
            to_index: 1,
            position_secs: 42.3,
        });

        bus.emit(event.clone()).ok();

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_filters_by_category() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, PlayerEvent::Access(_)));

        let (media_id, playback_event) = track_event();
        let access_event = PlayerEvent::Access(AccessEvent::PreviewExpired { media_id });

        bus.emit(playback_event).ok();
        bus.emit(access_event.clone()).ok();

        // The playback event is skipped; the access event comes through.
        let received = stream.recv().await.unwrap();
        assert_eq!(received, access_event);
    }

    #[tokio::test]
    async fn test_event_stream_try_recv_empty() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());
    }

    #[test]
    fn test_severity_classification() {
        let media_id = MediaId::Track(TrackId::new());

        let exhausted = PlayerEvent::Source(SourceEvent::SourcesExhausted {
            media_id,
            attempted: 3,
        });
        assert_eq!(exhausted.severity(), EventSeverity::Error);

        let expired = PlayerEvent::Access(AccessEvent::PreviewExpired { media_id });
        assert_eq!(expired.severity(), EventSeverity::Warning);

        let started = PlayerEvent::Playback(PlaybackEvent::Started { media_id });
        assert_eq!(started.severity(), EventSeverity::Info);

        let switched = PlayerEvent::Playback(PlaybackEvent::ProducerActivated {
            producer: ProducerKind::Stream,
        });
        assert_eq!(switched.severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_serialization_envelope() {
        let media_id = MediaId::Track(TrackId::new());
        let event = PlayerEvent::Access(AccessEvent::LimitReached {
            media_id,
            play_count: 3,
            max_free_plays: 3,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Access");
        assert_eq!(json["payload"]["event"], "LimitReached");
        assert_eq!(json["payload"]["play_count"], 3);

        let round_tripped: PlayerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(round_tripped, event);
    }

    #[test]
    fn test_descriptions_are_distinct_for_gating_events() {
        let media_id = MediaId::Track(TrackId::new());
        let expired = PlayerEvent::Access(AccessEvent::PreviewExpired { media_id });
        let limited = PlayerEvent::Access(AccessEvent::LimitReached {
            media_id,
            play_count: 3,
            max_free_plays: 3,
        });

        // Distinct calls-to-action depend on these never collapsing.
        assert_ne!(expired.description(), limited.description());
    }
}
