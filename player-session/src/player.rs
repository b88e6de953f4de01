//! # Player Facade
//!
//! The single entry point hosts embed. Wires the access gate, source
//! resolution, the playback controller, and the two producers together,
//! and runs the reactor task that turns bus events into gate bookkeeping,
//! gating enforcement, and queue auto-advance.
//!
//! ## Responsibilities
//!
//! | Concern | Delegate |
//! |---------|----------|
//! | Listen access, previews, quotas | [`AccessGate`] |
//! | Candidate URL resolution | [`SourceResolver`] |
//! | Engine driving, failover | [`PlaybackController`] |
//! | Producer exclusivity | arbitrator |
//! | Queue order, shuffle, repeat | [`PlayQueue`] |
//!
//! The facade itself holds only the queue and the reactor; everything else
//! is delegated.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use player_access::{AccessGate, AccessState, ListenerIdentity};
use player_bridge::{
    ActiveMedia, ConnectionMonitor, OwnershipLedger, PlayCountLedger, PlaybackEngine,
    ProducerKind, StreamFeed, TrackDirectory, TrackId, TrackRef,
};
use player_runtime::events::RecvError;
use player_runtime::{AccessEvent, EventBus, PlaybackEvent, PlayerConfig, PlayerEvent};
use player_sources::{GatewaySet, SourceResolver};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::arbitrator::SourceArbitrator;
use crate::controller::PlaybackController;
use crate::error::{PlaybackError, Result};
use crate::launch::Launcher;
use crate::queue::{AdvanceReason, PlayQueue, RepeatMode};
use crate::state::PlaybackStateHandle;
use crate::stream::StreamProducer;
use crate::task::{arm, disarm};

// ============================================================================
// Dependencies
// ============================================================================

/// Host-provided implementations the player is built over.
pub struct PlayerDependencies {
    /// The audio engine for this platform.
    pub engine: Arc<dyn PlaybackEngine>,
    /// Token-holdings and ownership reads.
    pub ownership: Arc<dyn OwnershipLedger>,
    /// Per-listener play counts and recording.
    pub plays: Arc<dyn PlayCountLedger>,
    /// Catalog lookups.
    pub directory: Arc<dyn TrackDirectory>,
    /// The continuous stream's schedule.
    pub stream_feed: Arc<dyn StreamFeed>,
    /// Connection quality probe.
    pub monitor: Arc<dyn ConnectionMonitor>,
    /// Configured content gateways.
    pub gateways: GatewaySet,
}

// ============================================================================
// Player
// ============================================================================

/// The embeddable playback core.
///
/// Cheap to clone; all clones share the same player. Construction wires
/// the parts and starts the reactor; [`close`](Self::close) shuts the
/// player down and releases its background tasks.
#[derive(Clone)]
pub struct Player {
    inner: Arc<PlayerInner>,
}

struct PlayerInner {
    config: PlayerConfig,
    events: EventBus,
    gate: AccessGate,
    controller: PlaybackController,
    arbitrator: SourceArbitrator,
    launcher: Launcher,
    directory: Arc<dyn TrackDirectory>,
    queue: Mutex<PlayQueue>,
    reactor_task: Mutex<Option<CancellationToken>>,
}

impl Player {
    /// Builds a player over the host's implementations.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::Config`] when `config` fails validation.
    pub fn new(deps: PlayerDependencies, config: PlayerConfig) -> Result<Self> {
        config.validate().map_err(PlaybackError::Config)?;

        let events = EventBus::new(config.event_buffer);
        let gate = AccessGate::new(
            deps.ownership,
            deps.plays,
            events.clone(),
            config.clone(),
        );
        let controller =
            PlaybackController::new(deps.engine, events.clone(), config.clone());
        let launcher = Launcher::new(
            gate.clone(),
            SourceResolver::new(deps.gateways),
            deps.monitor,
            controller.clone(),
            events.clone(),
        );
        let stream = StreamProducer::new(deps.stream_feed, launcher.clone());
        let arbitrator = SourceArbitrator::new(controller.clone(), stream, events.clone());

        let player = Self {
            inner: Arc::new(PlayerInner {
                config,
                events,
                gate,
                controller,
                arbitrator,
                launcher,
                directory: deps.directory,
                queue: Mutex::new(PlayQueue::new()),
                reactor_task: Mutex::new(None),
            }),
        };
        player.spawn_reactor();
        Ok(player)
    }

    /// The active configuration.
    pub fn config(&self) -> &PlayerConfig {
        &self.inner.config
    }

    /// The player's event bus.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// A read-only subscription to the shared playback snapshot.
    pub fn state(&self) -> PlaybackStateHandle {
        self.inner.controller.state_handle()
    }

    /// Current listen-access state.
    pub fn access_state(&self) -> AccessState {
        self.inner.gate.state()
    }

    /// The item occupying the playback slot, if any.
    pub fn active_media(&self) -> Option<ActiveMedia> {
        self.inner.controller.active_media()
    }

    /// The producer currently holding the slot.
    pub fn active_producer(&self) -> Option<ProducerKind> {
        self.inner.arbitrator.active()
    }

    // ========================================================================
    // Identity and access
    // ========================================================================

    /// Switches the listener identity (login, logout, account change).
    ///
    /// Resets preview and quota tracking and re-evaluates access for the
    /// current item.
    pub async fn set_listener(&self, listener: ListenerIdentity) {
        info!(authenticated = listener.is_authenticated(), "listener changed");
        self.inner.gate.set_listener(listener).await;
    }

    /// Notifies the gate that an access input changed outside the player
    /// (a purchase settled, a price moved, an override was granted).
    ///
    /// The re-read happens after the configured settle delay; rapid
    /// notifications coalesce into one.
    pub fn refresh_access(&self) {
        self.inner.gate.note_dependency_changed();
    }

    // ========================================================================
    // Producers
    // ========================================================================

    /// Tunes into the continuous stream.
    ///
    /// Stops the on-demand queue if it holds the slot; its position is not
    /// kept. Joining mid-item starts at the live offset.
    pub async fn listen_stream(&self) -> Result<()> {
        self.inner.arbitrator.activate(ProducerKind::Stream).await
    }

    /// Plays `track` immediately on the on-demand producer.
    ///
    /// If the track is already in the queue the cursor jumps to it;
    /// otherwise the queue is replaced by this single track.
    pub async fn play_now(&self, track: TrackRef) -> Result<()> {
        {
            let mut queue = self.inner.queue.lock();
            if queue.jump_to(track.id).is_none() {
                queue.set_entries(vec![track.clone()], 0);
            }
        }
        self.inner.arbitrator.activate(ProducerKind::OnDemand).await?;
        self.inner
            .launcher
            .launch(ActiveMedia::Track(track), ProducerKind::OnDemand, None, true)
            .await
    }

    /// Looks `id` up in the catalog and plays it immediately.
    pub async fn play_from_catalog(&self, id: &TrackId) -> Result<()> {
        let details = self.inner.directory.track(id).await?;
        self.play_now(details.to_ref()).await
    }

    /// Replaces the queue and starts playing from `start_index`.
    ///
    /// An out-of-range index clamps to the last entry. An empty list
    /// refuses playback.
    pub async fn play_queue(&self, tracks: Vec<TrackRef>, start_index: usize) -> Result<()> {
        if tracks.is_empty() {
            return Err(PlaybackError::NoSources);
        }
        let current = {
            let mut queue = self.inner.queue.lock();
            queue.set_entries(tracks, start_index);
            queue.current().cloned()
        };
        let Some(track) = current else {
            return Err(PlaybackError::NoSources);
        };
        self.inner.arbitrator.activate(ProducerKind::OnDemand).await?;
        self.inner
            .launcher
            .launch(ActiveMedia::Track(track), ProducerKind::OnDemand, None, true)
            .await
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Starts or resumes playback of the loaded item.
    ///
    /// Access is re-checked first, so a preview that expired or a quota
    /// that ran out while paused refuses the resume.
    pub async fn play(&self) -> Result<()> {
        let Some(media) = self.inner.controller.active_media() else {
            return Err(PlaybackError::NoActiveSession);
        };
        let decision = self.inner.gate.authorize(&media);
        if !decision.is_allowed() {
            return Err(PlaybackError::AccessDenied { reason: decision });
        }
        self.inner.controller.play().await
    }

    /// Pauses playback, keeping the item and position.
    pub async fn pause(&self) -> Result<()> {
        self.inner.controller.pause().await
    }

    /// Plays when paused, pauses when playing.
    pub async fn toggle_play(&self) -> Result<()> {
        if self.inner.controller.is_playing() {
            self.pause().await
        } else {
            self.play().await
        }
    }

    /// Seeks within the current item, clamped to its duration.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::StreamDriven`] while the stream holds the slot;
    /// listeners cannot scrub a shared broadcast.
    pub async fn seek(&self, position: Duration) -> Result<()> {
        if self.active_producer() == Some(ProducerKind::Stream) {
            return Err(PlaybackError::StreamDriven);
        }
        self.inner.controller.seek(position).await
    }

    /// Skips to the next queue entry.
    ///
    /// At the end of the queue with repeat off, playback stops.
    pub async fn next(&self) -> Result<()> {
        if self.active_producer() == Some(ProducerKind::Stream) {
            return Err(PlaybackError::StreamDriven);
        }
        let next = {
            let mut queue = self.inner.queue.lock();
            queue.advance(AdvanceReason::UserRequest).cloned()
        };
        match next {
            Some(track) => {
                self.inner
                    .launcher
                    .launch(ActiveMedia::Track(track), ProducerKind::OnDemand, None, true)
                    .await
            }
            None => self.inner.controller.stop().await,
        }
    }

    /// Steps back to the previous queue entry.
    ///
    /// At the start of the queue this restarts the current track instead.
    pub async fn previous(&self) -> Result<()> {
        if self.active_producer() == Some(ProducerKind::Stream) {
            return Err(PlaybackError::StreamDriven);
        }
        let previous = {
            let mut queue = self.inner.queue.lock();
            queue.step_back().cloned()
        };
        match previous {
            Some(track) => {
                self.inner
                    .launcher
                    .launch(ActiveMedia::Track(track), ProducerKind::OnDemand, None, true)
                    .await
            }
            None => self.inner.controller.seek(Duration::ZERO).await,
        }
    }

    /// Stops playback and releases the slot from whichever producer holds
    /// it.
    pub async fn stop(&self) -> Result<()> {
        self.inner.arbitrator.release().await?;
        self.inner.gate.media_changed(None).await;
        Ok(())
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// Sets output volume in `[0.0, 1.0]`; out-of-range values clamp.
    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        self.inner.controller.set_volume(volume).await
    }

    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        self.inner.controller.set_muted(muted).await
    }

    /// Flips mute and returns the new state.
    pub async fn toggle_mute(&self) -> Result<bool> {
        self.inner.controller.toggle_mute().await
    }

    pub fn volume(&self) -> f32 {
        self.inner.controller.volume()
    }

    pub fn is_muted(&self) -> bool {
        self.inner.controller.is_muted()
    }

    // ========================================================================
    // Queue settings
    // ========================================================================

    pub fn set_shuffle(&self, shuffle: bool) {
        self.inner.queue.lock().set_shuffle(shuffle);
    }

    pub fn set_repeat(&self, repeat: RepeatMode) {
        self.inner.queue.lock().set_repeat(repeat);
    }

    pub fn shuffle(&self) -> bool {
        self.inner.queue.lock().shuffle()
    }

    pub fn repeat(&self) -> RepeatMode {
        self.inner.queue.lock().repeat()
    }

    /// Snapshot of the queue entries in catalog order.
    pub fn queue_entries(&self) -> Vec<TrackRef> {
        self.inner.queue.lock().entries().to_vec()
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Stops playback and all background tasks.
    ///
    /// The reactor holds a player handle, so the player stays alive until
    /// close is called even when the host drops its clones.
    pub async fn close(&self) -> Result<()> {
        let result = self.stop().await;
        self.inner.gate.close();
        disarm(&self.inner.reactor_task);
        result
    }

    // ========================================================================
    // Reactor
    // ========================================================================

    /// Routes bus events into gate bookkeeping, gating enforcement, and
    /// queue auto-advance.
    fn spawn_reactor(&self) {
        let token = arm(&self.inner.reactor_task);
        let player = self.clone();
        let mut events = self.inner.events.subscribe();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = token.cancelled() => break,
                    event = events.recv() => event,
                };
                match event {
                    Ok(event) => player.handle_event(event).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "reactor lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    async fn handle_event(&self, event: PlayerEvent) {
        match event {
            PlayerEvent::Playback(PlaybackEvent::Started { .. })
            | PlayerEvent::Playback(PlaybackEvent::Resumed { .. }) => {
                if let Some(media) = self.inner.controller.active_media() {
                    self.inner.gate.note_playback_started(&media);
                }
            }
            PlayerEvent::Playback(PlaybackEvent::Paused { .. })
            | PlayerEvent::Playback(PlaybackEvent::Stopped { .. }) => {
                self.inner.gate.note_playback_stopped();
            }
            PlayerEvent::Playback(PlaybackEvent::Completed { media_id }) => {
                self.inner.gate.note_playback_stopped();
                if self.active_producer() == Some(ProducerKind::OnDemand) {
                    debug!(%media_id, "advancing queue after completion");
                    let player = self.clone();
                    tokio::spawn(async move { player.advance_after_completion().await });
                }
            }
            // The gate decides; the player enforces by suspending output.
            PlayerEvent::Access(AccessEvent::PreviewExpired { .. })
            | PlayerEvent::Access(AccessEvent::LimitReached { .. }) => {
                if let Err(error) = self.inner.controller.pause().await {
                    debug!(%error, "enforcement pause had nothing to act on");
                }
            }
            _ => {}
        }
    }

    async fn advance_after_completion(&self) {
        let next = {
            let mut queue = self.inner.queue.lock();
            queue.advance(AdvanceReason::NaturalEnd).cloned()
        };
        let Some(track) = next else {
            debug!("queue finished");
            return;
        };
        if let Err(error) = self
            .inner
            .launcher
            .launch(ActiveMedia::Track(track), ProducerKind::OnDemand, None, true)
            .await
        {
            warn!(%error, "failed to start the next queue entry");
        }
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("producer", &self.active_producer())
            .field("queue_len", &self.inner.queue.lock().len())
            .finish()
    }
}
