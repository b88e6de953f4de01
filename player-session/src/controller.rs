//! # Playback Controller
//!
//! Owns the single engine handle and drives it through
//! load/play/pause/seek, recovering from source failures by advancing
//! through the candidate list while preserving the playhead.
//!
//! ## State machine
//!
//! Idle → Loading → Playing ⇄ Paused. A fatal source error moves to the
//! next candidate (Loading again); running out of candidates reports the
//! exhaustion once and returns to Idle.
//!
//! ## Rejection classification
//!
//! A refused play is not one thing:
//!
//! - **Permission denied**: the engine wants a user gesture. The source is
//!   kept; the host re-issues play after the tap.
//! - **Unsupported format**: the candidate itself is bad; fail over
//!   immediately.
//! - **Transient abort**: a rapid source swap raced the engine's pipeline;
//!   the same call is retried once after a short delay, then given up.
//!
//! ## Ordering
//!
//! Every load bumps a generation counter. Async resolutions check their
//! generation before applying side effects, so a play that resolves after
//! the item changed is dropped instead of mutating the new session.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use player_bridge::{ActiveMedia, EngineError, EngineStatus, PlaybackEngine, ProducerKind, SourceUrl};
use player_runtime::{EventBus, PlaybackEvent, PlayerConfig, PlayerEvent, SourceEvent};
use tokio::sync::watch;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::{PlaybackError, Result};
use crate::session::PlaybackSession;
use crate::state::{snapshot_channel, PlaybackSnapshot, PlaybackStateHandle};
use crate::task::{arm, disarm};

// ============================================================================
// Controller
// ============================================================================

/// Drives the playback engine for whichever producer currently owns the
/// slot. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    engine: Arc<dyn PlaybackEngine>,
    events: EventBus,
    config: PlayerConfig,

    session: RwLock<Option<PlaybackSession>>,
    output: Mutex<OutputSettings>,
    snapshot_tx: watch::Sender<PlaybackSnapshot>,

    /// Bumped on every load and stop; stale async resolutions compare
    /// against it and drop themselves.
    generation: AtomicU64,
    /// First successful play of the current item emits `Started`; later
    /// ones emit `Resumed`.
    started: AtomicBool,
    /// Latch so a session emits `Completed` once.
    completed: AtomicBool,

    poll_task: Mutex<Option<CancellationToken>>,
}

/// Host volume preferences, re-applied after every source swap because
/// engines reset both on reassignment.
#[derive(Debug, Clone, Copy)]
struct OutputSettings {
    volume: f32,
    muted: bool,
}

impl PlaybackController {
    pub fn new(engine: Arc<dyn PlaybackEngine>, events: EventBus, config: PlayerConfig) -> Self {
        let (snapshot_tx, _handle) = snapshot_channel();
        let volume = config.default_volume.clamp(0.0, 1.0);
        Self {
            inner: Arc::new(ControllerInner {
                engine,
                events,
                config,
                session: RwLock::new(None),
                output: Mutex::new(OutputSettings {
                    volume,
                    muted: false,
                }),
                snapshot_tx,
                generation: AtomicU64::new(0),
                started: AtomicBool::new(false),
                completed: AtomicBool::new(false),
                poll_task: Mutex::new(None),
            }),
        }
    }

    /// A read-only subscription to the playback snapshot.
    pub fn state_handle(&self) -> PlaybackStateHandle {
        PlaybackStateHandle::new(self.inner.snapshot_tx.subscribe())
    }

    /// Clone of the current session, if one exists.
    pub fn session(&self) -> Option<PlaybackSession> {
        self.inner.session.read().clone()
    }

    /// The item currently occupying the slot.
    pub fn active_media(&self) -> Option<ActiveMedia> {
        self.inner.session.read().as_ref().map(|s| s.media.clone())
    }

    pub fn is_playing(&self) -> bool {
        self.inner
            .session
            .read()
            .as_ref()
            .map(|s| s.is_playing)
            .unwrap_or(false)
    }

    // ========================================================================
    // Lifecycle operations
    // ========================================================================

    /// Loads `media` from the first candidate source.
    ///
    /// Re-loading the item already in the slot keeps its playhead; a
    /// different item starts from zero. Candidates that fail to load are
    /// skipped; running out of them reports the exhaustion.
    #[instrument(skip(self, media, sources), fields(media = %media.media_id(), candidates = sources.len()))]
    pub async fn load(
        &self,
        media: ActiveMedia,
        producer: ProducerKind,
        sources: Vec<SourceUrl>,
    ) -> Result<()> {
        if sources.is_empty() {
            return Err(PlaybackError::NoSources);
        }

        let resume_from = {
            let session = self.inner.session.read();
            session
                .as_ref()
                .filter(|s| s.media.media_id() == media.media_id())
                .map(|s| s.current_time)
                .filter(|t| !t.is_zero())
        };

        let generation = self.begin_generation();
        self.inner.started.store(false, Ordering::Release);
        self.inner.completed.store(false, Ordering::Release);

        *self.inner.session.write() = Some(PlaybackSession::new(media, producer, sources));
        self.publish();

        self.activate_source(generation, 0, resume_from, false, None)
            .await
    }

    /// Begins or resumes playback of the loaded item.
    #[instrument(skip(self))]
    pub async fn play(&self) -> Result<()> {
        let generation = self.current_generation();
        {
            let session = self.inner.session.read();
            let Some(session) = session.as_ref() else {
                return Err(PlaybackError::NoActiveSession);
            };
            if session.is_playing {
                return Ok(());
            }
        }

        match self.try_play(generation).await {
            Ok(()) => Ok(()),
            Err(error) if error.is_permission_denied() => {
                debug!(%error, "playback blocked pending user gesture");
                if let Some(media_id) = self.current_media_id() {
                    self.inner
                        .events
                        .emit(PlayerEvent::Playback(PlaybackEvent::PermissionRequired {
                            media_id,
                        }))
                        .ok();
                }
                Err(PlaybackError::PermissionDenied)
            }
            Err(error) if is_fatal_for_source(&error) => {
                warn!(%error, "source refused to play; failing over");
                self.fail_over(generation, true).await
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Suspends playback, keeping the source and playhead.
    #[instrument(skip(self))]
    pub async fn pause(&self) -> Result<()> {
        let generation = self.current_generation();
        let (media_id, was_playing) = {
            let session = self.inner.session.read();
            let Some(session) = session.as_ref() else {
                return Err(PlaybackError::NoActiveSession);
            };
            (session.media_id(), session.is_playing)
        };
        if !was_playing {
            return Ok(());
        }

        self.inner.engine.pause().await?;
        if self.stale(generation) {
            return Ok(());
        }

        let position = self.update_session(|session| {
            session.is_playing = false;
            session.current_time
        });
        self.publish();
        self.inner
            .events
            .emit(PlayerEvent::Playback(PlaybackEvent::Paused {
                media_id,
                position_secs: position.unwrap_or_default().as_secs_f64(),
            }))
            .ok();
        Ok(())
    }

    /// Moves the playhead, clamped to the loaded duration.
    ///
    /// Positions below zero cannot be expressed by the type, so only the
    /// upper bound needs clamping.
    pub async fn seek(&self, position: Duration) -> Result<()> {
        let generation = self.current_generation();
        let duration = {
            let session = self.inner.session.read();
            let Some(session) = session.as_ref() else {
                return Err(PlaybackError::NoActiveSession);
            };
            session.duration
        };

        let clamped = position.min(duration);
        self.inner.engine.seek(clamped).await?;
        if self.stale(generation) {
            return Ok(());
        }

        // Seeking away from the end re-arms the completion latch.
        if clamped < duration {
            self.inner.completed.store(false, Ordering::Release);
        }
        self.update_session(|session| session.current_time = clamped);
        self.publish();
        Ok(())
    }

    /// Unloads the engine and clears the slot. Idempotent.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        let media_id = {
            let session = self.inner.session.read();
            session.as_ref().map(|s| s.media_id())
        };
        let Some(media_id) = media_id else {
            return Ok(());
        };

        self.begin_generation();
        disarm(&self.inner.poll_task);

        if let Err(error) = self.inner.engine.unload().await {
            warn!(%error, "engine unload failed");
        }

        *self.inner.session.write() = None;
        self.publish();
        self.inner
            .events
            .emit(PlayerEvent::Playback(PlaybackEvent::Stopped { media_id }))
            .ok();
        Ok(())
    }

    // ========================================================================
    // Output settings
    // ========================================================================

    /// Sets output volume, clamped to `[0.0, 1.0]`. The preference
    /// survives source swaps.
    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        let clamped = volume.clamp(0.0, 1.0);
        self.inner.output.lock().volume = clamped;
        self.inner.engine.set_volume(clamped).await?;
        Ok(())
    }

    pub async fn set_muted(&self, muted: bool) -> Result<()> {
        self.inner.output.lock().muted = muted;
        self.inner.engine.set_muted(muted).await?;
        Ok(())
    }

    /// Flips mute and returns the new state.
    pub async fn toggle_mute(&self) -> Result<bool> {
        let muted = !self.inner.output.lock().muted;
        self.set_muted(muted).await?;
        Ok(muted)
    }

    pub fn volume(&self) -> f32 {
        self.inner.output.lock().volume
    }

    pub fn is_muted(&self) -> bool {
        self.inner.output.lock().muted
    }

    // ========================================================================
    // Failover
    // ========================================================================

    /// Moves playback to the next candidate source after a fatal error.
    ///
    /// Preserves the playhead, restores it once the replacement's metadata
    /// is available, and resumes when `resume` is set. With no candidate
    /// left, reports `SourcesExhausted` exactly once and returns to idle.
    async fn fail_over(&self, generation: u64, resume: bool) -> Result<()> {
        let (failed_index, position) = {
            let session = self.inner.session.read();
            let Some(session) = session.as_ref() else {
                return Ok(());
            };
            (session.active_source_index, session.current_time)
        };

        self.activate_source(
            generation,
            failed_index + 1,
            Some(position),
            resume,
            Some(failed_index),
        )
        .await
    }

    /// Walks the candidate list from `index` until one loads.
    ///
    /// `restore` is re-applied once metadata is available; `failed_from`
    /// marks this walk as a failover so the swap is announced.
    async fn activate_source(
        &self,
        generation: u64,
        index: usize,
        restore: Option<Duration>,
        resume: bool,
        failed_from: Option<usize>,
    ) -> Result<()> {
        let mut index = index;
        let mut restore = restore;

        loop {
            if self.stale(generation) {
                return Ok(());
            }

            let source = {
                let session = self.inner.session.read();
                let Some(session) = session.as_ref() else {
                    return Ok(());
                };
                session.candidate_sources.get(index).cloned()
            };
            let Some(source) = source else {
                return self.report_exhausted(generation).await;
            };

            debug!(index, source = %source, "activating source");
            self.update_session(|session| session.active_source_index = index);

            let info = match self.inner.engine.load(&source).await {
                Ok(info) => info,
                Err(error) => {
                    warn!(index, %error, "candidate failed to load");
                    index += 1;
                    continue;
                }
            };
            if self.stale(generation) {
                return Ok(());
            }

            self.apply_output_settings().await;

            let position = restore.unwrap_or(Duration::ZERO).min(info.duration);
            if !position.is_zero() {
                if let Err(error) = self.inner.engine.seek(position).await {
                    warn!(%error, "failed to restore playhead after swap");
                }
            }
            self.update_session(|session| {
                session.duration = info.duration;
                session.current_time = position;
            });

            if resume {
                match self.try_play(generation).await {
                    Ok(()) => {}
                    Err(error) if error.is_permission_denied() => {
                        if let Some(media_id) = self.current_media_id() {
                            self.inner
                                .events
                                .emit(PlayerEvent::Playback(PlaybackEvent::PermissionRequired {
                                    media_id,
                                }))
                                .ok();
                        }
                        self.spawn_position_poll(generation);
                        self.publish();
                        return Err(PlaybackError::PermissionDenied);
                    }
                    Err(error) if is_fatal_for_source(&error) => {
                        warn!(index, %error, "candidate loaded but refused to play");
                        restore = Some(position);
                        index += 1;
                        continue;
                    }
                    Err(error) => {
                        self.spawn_position_poll(generation);
                        self.publish();
                        return Err(error.into());
                    }
                }
            }

            if let (Some(from_index), Some(media_id)) = (failed_from, self.current_media_id()) {
                self.inner
                    .events
                    .emit(PlayerEvent::Source(SourceEvent::FailedOver {
                        media_id,
                        from_index,
                        to_index: index,
                        position_secs: position.as_secs_f64(),
                    }))
                    .ok();
            }

            self.spawn_position_poll(generation);
            self.publish();
            return Ok(());
        }
    }

    /// Terminal path: every candidate failed.
    async fn report_exhausted(&self, generation: u64) -> Result<()> {
        if self.stale(generation) {
            return Ok(());
        }

        let (media_id, attempted) = {
            let session = self.inner.session.read();
            let Some(session) = session.as_ref() else {
                return Ok(());
            };
            (session.media_id(), session.candidate_sources.len())
        };

        warn!(%media_id, attempted, "all candidate sources failed");
        self.begin_generation();
        disarm(&self.inner.poll_task);
        if let Err(error) = self.inner.engine.unload().await {
            debug!(%error, "unload after exhaustion failed");
        }
        *self.inner.session.write() = None;
        self.publish();

        self.inner
            .events
            .emit(PlayerEvent::Source(SourceEvent::SourcesExhausted {
                media_id,
                attempted,
            }))
            .ok();
        Err(PlaybackError::SourcesExhausted { attempted })
    }

    // ========================================================================
    // Play attempt
    // ========================================================================

    /// One classified play attempt, transient aborts retried per policy.
    ///
    /// On success, marks the session playing and emits `Started` on the
    /// first play of an item, `Resumed` afterwards. A resolution arriving
    /// after the item changed is dropped.
    async fn try_play(&self, generation: u64) -> std::result::Result<(), EngineError> {
        let policy = self.inner.config.transient_retry_policy();
        let engine = Arc::clone(&self.inner.engine);
        policy
            .run(
                move || {
                    let engine = Arc::clone(&engine);
                    async move { engine.play().await }
                },
                |error: &EngineError| error.is_transient(),
            )
            .await?;

        if self.stale(generation) {
            debug!("dropping stale play resolution");
            return Ok(());
        }

        let first = !self.inner.started.swap(true, Ordering::AcqRel);
        let state = self.update_session(|session| {
            session.is_playing = true;
            (session.media_id(), session.current_time)
        });
        self.publish();

        if let Some((media_id, position)) = state {
            let event = if first {
                PlaybackEvent::Started { media_id }
            } else {
                PlaybackEvent::Resumed {
                    media_id,
                    position_secs: position.as_secs_f64(),
                }
            };
            self.inner.events.emit(PlayerEvent::Playback(event)).ok();
        }
        Ok(())
    }

    // ========================================================================
    // Position poll
    // ========================================================================

    /// Samples position, status, and the async error channel.
    fn spawn_position_poll(&self, generation: u64) {
        let token = arm(&self.inner.poll_task);
        let controller = self.clone();
        tokio::spawn(async move {
            let interval = controller.inner.config.position_poll_interval;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = sleep(interval) => {}
                }
                if controller.stale(generation) {
                    break;
                }
                controller.poll_once(generation).await;
            }
        });
    }

    async fn poll_once(&self, generation: u64) {
        // Mid-playback failures arrive asynchronously; anything fatal
        // triggers a failover from the current playhead.
        if let Some(error) = self.inner.engine.take_error().await {
            if self.stale(generation) {
                return;
            }
            warn!(%error, "engine reported asynchronous failure");
            let resume = self.is_playing();
            let _ = self.fail_over(generation, resume).await;
            return;
        }

        let status = self.inner.engine.status().await;
        if status == EngineStatus::Ended {
            self.handle_natural_end(generation);
            return;
        }

        let position = match self.inner.engine.position().await {
            Ok(position) => position,
            // Transitional states (mid-swap) have no position; skip the tick.
            Err(_) => return,
        };
        if self.stale(generation) {
            return;
        }

        let changed = {
            let mut guard = self.inner.session.write();
            let Some(session) = guard.as_mut() else {
                return;
            };
            let playing = status == EngineStatus::Playing;

            // Engines briefly report zero after a reload; a paused session
            // keeps its last known position instead of snapping the
            // scrubber back.
            let spurious_zero =
                !playing && position.is_zero() && !session.current_time.is_zero();
            if !spurious_zero {
                session.current_time = position;
            }
            let was_playing = session.is_playing;
            session.is_playing = playing;
            !spurious_zero || was_playing != playing
        };

        if changed {
            self.publish();
        }
    }

    fn handle_natural_end(&self, generation: u64) {
        if self.stale(generation) {
            return;
        }
        if self.inner.completed.swap(true, Ordering::AcqRel) {
            return;
        }

        let media_id = self.update_session(|session| {
            session.is_playing = false;
            session.current_time = session.duration;
            session.media_id()
        });
        self.publish();

        if let Some(media_id) = media_id {
            debug!(%media_id, "item played to completion");
            self.inner
                .events
                .emit(PlayerEvent::Playback(PlaybackEvent::Completed { media_id }))
                .ok();
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn current_generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    fn begin_generation(&self) -> u64 {
        disarm(&self.inner.poll_task);
        self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn stale(&self, generation: u64) -> bool {
        self.current_generation() != generation
    }

    fn current_media_id(&self) -> Option<player_bridge::MediaId> {
        self.inner.session.read().as_ref().map(|s| s.media_id())
    }

    /// Runs `f` against the session if one exists, returning its result.
    fn update_session<T>(&self, f: impl FnOnce(&mut PlaybackSession) -> T) -> Option<T> {
        let mut guard = self.inner.session.write();
        guard.as_mut().map(f)
    }

    /// Re-applies volume and mute; engines reset both on source swaps.
    async fn apply_output_settings(&self) {
        let settings = *self.inner.output.lock();
        if let Err(error) = self.inner.engine.set_volume(settings.volume).await {
            warn!(%error, "failed to re-apply volume");
        }
        if let Err(error) = self.inner.engine.set_muted(settings.muted).await {
            warn!(%error, "failed to re-apply mute");
        }
    }

    /// Publishes the snapshot if it differs from the last one.
    fn publish(&self) {
        let snapshot = {
            let session = self.inner.session.read();
            match session.as_ref() {
                Some(session) => PlaybackSnapshot {
                    media_id: Some(session.media_id()),
                    current_time_secs: session.current_time.as_secs_f64(),
                    duration_secs: session.duration.as_secs_f64(),
                    is_playing: session.is_playing,
                },
                None => PlaybackSnapshot::empty(),
            }
        };
        self.inner.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("session", &*self.inner.session.read())
            .finish()
    }
}

/// Whether an engine error means this source is done for.
///
/// Permission and transient failures keep the source; format errors and
/// generic failures advance past it.
fn is_fatal_for_source(error: &EngineError) -> bool {
    error.is_format_error() || matches!(error, EngineError::Failed(_))
}
