//! # Access Gate
//!
//! Decides whether the current listener may start or continue playback of
//! the current track, and records plays against the quota ledger.
//!
//! ## Responsibilities
//!
//! - **Anonymous preview**: a preview window that counts down only while
//!   audio is actually playing, resets on track change, and raises
//!   [`AccessEvent::PreviewExpired`] when it runs out.
//! - **Ownership and quota**: authenticated listeners play freely when they
//!   own the track (holdings value over the threshold, being the uploader,
//!   or a ledger-side override) and otherwise consume a small free-play
//!   allowance per track.
//! - **Play recording**: one record call per uninterrupted play session,
//!   issued after a short debounce of continuous playback.
//! - **Fail open**: a ledger outage never blocks playback; the gate marks
//!   its state degraded and allows the play.
//!
//! The gate holds no engine handle. Enforcement is event-driven: it emits
//! [`AccessEvent::PreviewExpired`] / [`AccessEvent::LimitReached`] and the
//! session layer pauses in response.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use player_bridge::{
    AccountId, ActiveMedia, Holdings, LedgerError, MediaId, OwnershipLedger, PlayCountLedger,
    PlayStatus, TrackId, TrackRef,
};
use player_runtime::{AccessEvent, EventBus, PlayerConfig, PlayerEvent};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::types::{seconds_ceil, AccessState, ListenerIdentity, PlayDecision};

// ============================================================================
// Gate
// ============================================================================

/// Listen-access policy engine.
///
/// Cheap to clone; all clones share state. The session layer calls
/// [`AccessGate::media_changed`] when the active item changes,
/// [`AccessGate::authorize`] before starting playback, and the
/// `note_playback_*` hooks as the play state flips. Hosts push identity and
/// balance changes through [`AccessGate::set_listener`] and
/// [`AccessGate::note_dependency_changed`].
#[derive(Clone)]
pub struct AccessGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    ownership: Arc<dyn OwnershipLedger>,
    plays: Arc<dyn PlayCountLedger>,
    events: EventBus,
    config: PlayerConfig,

    listener: RwLock<ListenerIdentity>,
    /// Track currently occupying the playback slot. Ads and an empty slot
    /// are both `None`; neither is gated.
    current: RwLock<Option<TrackRef>>,
    state: RwLock<AccessState>,

    /// Time left in the anonymous preview window.
    preview_remaining: Mutex<Duration>,
    /// Effective play-count floor for the current (listener, track) pairing.
    standing: Mutex<Standing>,

    playing: AtomicBool,
    /// Set once a play has been recorded this session; cleared when
    /// playback stops or the record call fails.
    recorded: AtomicBool,
    /// Bumped on every track or listener change; evaluations that started
    /// under an older value discard their result.
    generation: AtomicU64,

    preview_task: Mutex<Option<CancellationToken>>,
    record_task: Mutex<Option<CancellationToken>>,
    refresh_task: Mutex<Option<CancellationToken>>,
}

#[derive(Default)]
struct Standing {
    key: Option<(AccountId, TrackId)>,
    play_count: u32,
}

impl AccessGate {
    pub fn new(
        ownership: Arc<dyn OwnershipLedger>,
        plays: Arc<dyn PlayCountLedger>,
        events: EventBus,
        config: PlayerConfig,
    ) -> Self {
        let state = AccessState::anonymous(config.preview_seconds(), config.max_free_plays);
        let preview_remaining = config.preview_duration;

        Self {
            inner: Arc::new(GateInner {
                ownership,
                plays,
                events,
                config,
                listener: RwLock::new(ListenerIdentity::Anonymous),
                current: RwLock::new(None),
                state: RwLock::new(state),
                preview_remaining: Mutex::new(preview_remaining),
                standing: Mutex::new(Standing::default()),
                playing: AtomicBool::new(false),
                recorded: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                preview_task: Mutex::new(None),
                record_task: Mutex::new(None),
                refresh_task: Mutex::new(None),
            }),
        }
    }

    /// Snapshot of the most recent evaluation.
    pub fn state(&self) -> AccessState {
        *self.inner.state.read()
    }

    pub fn listener(&self) -> ListenerIdentity {
        self.inner.listener.read().clone()
    }

    // ========================================================================
    // Identity and occupancy
    // ========================================================================

    /// Switches the listener identity and re-evaluates immediately.
    #[instrument(skip(self, listener), fields(authenticated = listener.is_authenticated()))]
    pub async fn set_listener(&self, listener: ListenerIdentity) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        disarm(&self.inner.preview_task);
        disarm(&self.inner.record_task);
        disarm(&self.inner.refresh_task);
        self.inner.recorded.store(false, Ordering::Release);

        *self.inner.preview_remaining.lock() = self.inner.config.preview_duration;
        *self.inner.listener.write() = listener.clone();
        *self.inner.state.write() = self.baseline_state(&listener);

        match listener {
            ListenerIdentity::Anonymous => {
                // A play session that was already running keeps running as
                // an anonymous preview.
                if self.inner.playing.load(Ordering::Acquire) {
                    let track = self.inner.current.read().clone();
                    if let Some(track) = track {
                        self.spawn_preview_countdown(MediaId::Track(track.id));
                    }
                }
            }
            ListenerIdentity::Authenticated(_) => {
                self.evaluate().await;
            }
        }
    }

    /// Registers the item now occupying the playback slot.
    ///
    /// Resets the preview window and the record flag, cancels in-flight
    /// evaluations for the previous item, and re-evaluates before
    /// returning, so a following [`AccessGate::authorize`] sees fresh state.
    #[instrument(skip(self, media), fields(media = ?media.map(|m| m.media_id())))]
    pub async fn media_changed(&self, media: Option<&ActiveMedia>) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        disarm(&self.inner.preview_task);
        disarm(&self.inner.record_task);
        disarm(&self.inner.refresh_task);
        self.inner.recorded.store(false, Ordering::Release);

        *self.inner.preview_remaining.lock() = self.inner.config.preview_duration;

        let track = media.and_then(|m| m.as_track().cloned());
        *self.inner.current.write() = track.clone();

        let listener = self.listener();
        *self.inner.state.write() = self.baseline_state(&listener);

        if listener.is_authenticated() && track.is_some() {
            self.evaluate().await;
        }
    }

    // ========================================================================
    // Admission
    // ========================================================================

    /// Decides whether playback of `media` may start right now.
    ///
    /// Ads are always admitted. For tracks the decision reads the cached
    /// evaluation, so call [`AccessGate::media_changed`] first when the item
    /// is new. Denials re-emit their gating event so the host surfaces the
    /// matching call-to-action even if the original emission was missed.
    pub fn authorize(&self, media: &ActiveMedia) -> PlayDecision {
        if media.is_ad() {
            return PlayDecision::Allowed;
        }

        let state = self.state();
        if state.can_play() {
            return PlayDecision::Allowed;
        }

        let media_id = media.media_id();
        if state.is_authenticated {
            debug!(%media_id, play_count = state.play_count, "play denied: free-play limit");
            self.inner
                .events
                .emit(PlayerEvent::Access(AccessEvent::LimitReached {
                    media_id,
                    play_count: state.play_count,
                    max_free_plays: state.max_free_plays,
                }))
                .ok();
            PlayDecision::LimitReached {
                play_count: state.play_count,
                max_free_plays: state.max_free_plays,
            }
        } else {
            debug!(%media_id, "play denied: preview expired");
            self.inner
                .events
                .emit(PlayerEvent::Access(AccessEvent::PreviewExpired { media_id }))
                .ok();
            PlayDecision::PreviewExpired
        }
    }

    // ========================================================================
    // Playback hooks
    // ========================================================================

    /// Playback of `media` started or resumed.
    ///
    /// Starts the preview countdown for anonymous listeners and arms the
    /// record-play timer for authenticated ones. Ads arm neither.
    pub fn note_playback_started(&self, media: &ActiveMedia) {
        self.inner.playing.store(true, Ordering::Release);

        let Some(track) = media.as_track() else {
            return;
        };

        match self.listener() {
            ListenerIdentity::Anonymous => {
                self.spawn_preview_countdown(media.media_id());
            }
            ListenerIdentity::Authenticated(account) => {
                if !self.inner.recorded.load(Ordering::Acquire) {
                    self.spawn_record_timer(account, track.id);
                }
            }
        }
    }

    /// Playback paused, stopped, or completed.
    ///
    /// Freezes the preview countdown, cancels a pending record timer, and
    /// resets the recorded flag so the next session records again.
    pub fn note_playback_stopped(&self) {
        self.inner.playing.store(false, Ordering::Release);
        disarm(&self.inner.preview_task);
        disarm(&self.inner.record_task);
        self.inner.recorded.store(false, Ordering::Release);
    }

    /// A gating dependency changed (balance, price, recorded count).
    ///
    /// Re-reads the ledgers after a settle delay; a burst of changes
    /// collapses into one re-read. Ledger writes that are still propagating
    /// when the change fires are why the delay exists.
    pub fn note_dependency_changed(&self) {
        let token = arm(&self.inner.refresh_task);
        let gate = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = sleep(gate.inner.config.access_settle_delay) => {}
            }
            gate.evaluate().await;
        });
    }

    /// Cancels every background task owned by the gate.
    pub fn close(&self) {
        disarm(&self.inner.preview_task);
        disarm(&self.inner.record_task);
        disarm(&self.inner.refresh_task);
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Recomputes [`AccessState`] from the ledgers and publishes it.
    ///
    /// Results are discarded when the track or listener changed while the
    /// reads were in flight.
    #[instrument(skip(self))]
    async fn evaluate(&self) {
        let generation = self.inner.generation.load(Ordering::Acquire);
        let listener = self.listener();
        let track = self.inner.current.read().clone();

        let next = match (&listener, &track) {
            (ListenerIdentity::Authenticated(account), Some(track)) => {
                self.evaluate_track(account, track).await
            }
            _ => self.baseline_state(&listener),
        };

        if self.inner.generation.load(Ordering::Acquire) != generation {
            debug!("discarding stale access evaluation");
            return;
        }

        *self.inner.state.write() = next;

        if listener.is_authenticated() {
            self.inner
                .events
                .emit(PlayerEvent::Access(AccessEvent::Updated {
                    is_owner: next.is_owner,
                    remaining_plays: next.remaining_plays(),
                    degraded: next.degraded,
                }))
                .ok();

            // Mid-session enforcement: the session layer pauses on this.
            if !next.can_play() && self.inner.playing.load(Ordering::Acquire) {
                if let Some(track) = &track {
                    self.inner
                        .events
                        .emit(PlayerEvent::Access(AccessEvent::LimitReached {
                            media_id: MediaId::Track(track.id),
                            play_count: next.play_count,
                            max_free_plays: next.max_free_plays,
                        }))
                        .ok();
                }
            }
        }
    }

    async fn evaluate_track(&self, account: &AccountId, track: &TrackRef) -> AccessState {
        let config = &self.inner.config;
        let mut degraded = false;

        let holdings = match flatten(
            timeout(
                config.external_timeout,
                self.inner.ownership.holdings(account, &track.id),
            )
            .await,
            config.external_timeout,
        ) {
            Ok(holdings) => holdings,
            Err(error) => {
                if error.is_transient() {
                    warn!(track = %track.id, %error, "ownership read failed; failing open");
                    degraded = true;
                }
                Holdings::none()
            }
        };

        let status = match flatten(
            timeout(
                config.external_timeout,
                self.inner.plays.play_status(account, &track.id),
            )
            .await,
            config.external_timeout,
        ) {
            Ok(status) => status,
            Err(error) => {
                if error.is_transient() {
                    warn!(track = %track.id, %error, "play-status read failed; failing open");
                    degraded = true;
                }
                PlayStatus {
                    play_count: 0,
                    owner_override: false,
                }
            }
        };

        // The effective count never moves backwards for the same pairing;
        // an eventually-consistent ledger may briefly report fewer plays.
        let play_count = {
            let mut standing = self.inner.standing.lock();
            let key = (account.clone(), track.id);
            let count = if standing.key.as_ref() == Some(&key) {
                standing.play_count.max(status.play_count)
            } else {
                status.play_count
            };
            *standing = Standing {
                key: Some(key),
                play_count: count,
            };
            count
        };

        let is_owner = holdings.value_usd() >= config.ownership_threshold_usd
            || *account == track.owner
            || status.owner_override;

        AccessState {
            is_authenticated: true,
            preview_seconds_remaining: 0,
            play_count,
            max_free_plays: config.max_free_plays,
            is_owner,
            degraded,
        }
    }

    /// State before any ledger read: anonymous gets a full preview window,
    /// authenticated gets the quota defaults.
    fn baseline_state(&self, listener: &ListenerIdentity) -> AccessState {
        let config = &self.inner.config;
        match listener {
            ListenerIdentity::Anonymous => {
                let remaining = *self.inner.preview_remaining.lock();
                AccessState::anonymous(seconds_ceil(remaining), config.max_free_plays)
            }
            ListenerIdentity::Authenticated(_) => AccessState::authenticated(config.max_free_plays),
        }
    }

    // ========================================================================
    // Background tasks
    // ========================================================================

    fn spawn_preview_countdown(&self, media_id: MediaId) {
        let token = arm(&self.inner.preview_task);
        let gate = self.clone();
        tokio::spawn(async move {
            let tick = gate.inner.config.preview_tick;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = sleep(tick) => {}
                }

                let remaining = {
                    let mut left = gate.inner.preview_remaining.lock();
                    *left = left.saturating_sub(tick);
                    *left
                };

                {
                    let mut state = gate.inner.state.write();
                    if !state.is_authenticated {
                        state.preview_seconds_remaining = seconds_ceil(remaining);
                    }
                }

                if remaining.is_zero() {
                    debug!(%media_id, "anonymous preview expired");
                    gate.inner
                        .events
                        .emit(PlayerEvent::Access(AccessEvent::PreviewExpired { media_id }))
                        .ok();
                    break;
                }
            }
        });
    }

    fn spawn_record_timer(&self, account: AccountId, track_id: TrackId) {
        let token = arm(&self.inner.record_task);
        let gate = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = sleep(gate.inner.config.record_play_delay) => {}
            }

            if gate.inner.recorded.swap(true, Ordering::AcqRel) {
                return;
            }

            debug!(%track_id, "recording play");
            let limit = gate.inner.config.external_timeout;
            let outcome = flatten(
                timeout(limit, gate.inner.plays.record_play(&account, &track_id)).await,
                limit,
            );

            match outcome {
                Ok(()) => {
                    gate.inner
                        .events
                        .emit(PlayerEvent::Access(AccessEvent::PlayRecorded { track_id }))
                        .ok();
                }
                Err(error) => {
                    warn!(%track_id, %error, "play record failed; re-arming for the next session");
                    gate.inner.recorded.store(false, Ordering::Release);
                    gate.inner
                        .events
                        .emit(PlayerEvent::Access(AccessEvent::RecordDeferred {
                            track_id,
                            message: error.to_string(),
                        }))
                        .ok();
                }
            }
        });
    }
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("state", &self.state())
            .field("playing", &self.inner.playing.load(Ordering::Acquire))
            .finish()
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Replaces the token in `slot`, cancelling whatever was armed before.
fn arm(slot: &Mutex<Option<CancellationToken>>) -> CancellationToken {
    let token = CancellationToken::new();
    if let Some(previous) = slot.lock().replace(token.clone()) {
        previous.cancel();
    }
    token
}

fn disarm(slot: &Mutex<Option<CancellationToken>>) {
    if let Some(token) = slot.lock().take() {
        token.cancel();
    }
}

/// Collapses a `timeout(...)` wrapper into the ledger error space.
fn flatten<T>(
    result: Result<Result<T, LedgerError>, tokio::time::error::Elapsed>,
    limit: Duration,
) -> Result<T, LedgerError> {
    match result {
        Ok(inner) => inner,
        Err(_) => Err(LedgerError::Timeout(limit)),
    }
}
