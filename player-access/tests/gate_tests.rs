//! Integration tests for the access gate
//!
//! These tests verify the complete gating workflow including:
//! - Anonymous preview countdown (runs only while playing, resets on change)
//! - Ownership evaluation (holdings value, uploader match, ledger override)
//! - Free-play quota admission and mid-session enforcement
//! - Play recording (debounce, once per session, re-arm on failure)
//! - Fail-open behavior on ledger outages
//!
//! Timers run against real time with millisecond-scale intervals.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use player_access::{AccessGate, ListenerIdentity, PlayDecision};
use player_bridge::{
    AccountId, ActiveMedia, AdId, AdRef, ContentId, Holdings, LedgerError, OwnershipLedger,
    PlayCountLedger, PlayStatus, TrackId, TrackRef,
};
use player_runtime::{AccessEvent, EventBus, PlayerConfig, PlayerEvent};
use tokio::sync::broadcast::Receiver;
use tokio::time::sleep;

// ============================================================================
// Mock Implementations
// ============================================================================

#[derive(Clone, Copy)]
enum FakeMode {
    Answer,
    Unavailable,
    Rejected,
}

/// Ownership ledger with a settable position.
struct FakeOwnership {
    holdings: Mutex<Holdings>,
    mode: Mutex<FakeMode>,
}

impl FakeOwnership {
    fn with_value(token_balance: f64, token_price_usd: f64) -> Arc<Self> {
        Arc::new(Self {
            holdings: Mutex::new(Holdings {
                token_balance,
                token_price_usd,
            }),
            mode: Mutex::new(FakeMode::Answer),
        })
    }

    fn broken() -> Arc<Self> {
        let ledger = Self::with_value(0.0, 0.0);
        ledger.set_mode(FakeMode::Unavailable);
        ledger
    }

    fn set_value(&self, token_balance: f64, token_price_usd: f64) {
        *self.holdings.lock().unwrap() = Holdings {
            token_balance,
            token_price_usd,
        };
    }

    fn set_mode(&self, mode: FakeMode) {
        *self.mode.lock().unwrap() = mode;
    }
}

#[async_trait::async_trait]
impl OwnershipLedger for FakeOwnership {
    async fn holdings(
        &self,
        _listener: &AccountId,
        _track: &TrackId,
    ) -> Result<Holdings, LedgerError> {
        let mode = *self.mode.lock().unwrap();
        match mode {
            FakeMode::Answer => Ok(*self.holdings.lock().unwrap()),
            FakeMode::Unavailable => Err(LedgerError::Unavailable("ledger offline".to_string())),
            FakeMode::Rejected => Err(LedgerError::Rejected("unknown token".to_string())),
        }
    }
}

/// Play-count ledger with a settable status and scriptable record failures.
struct FakePlays {
    status: Mutex<PlayStatus>,
    mode: Mutex<FakeMode>,
    /// Number of upcoming `record_play` calls that fail.
    record_failures: AtomicU32,
    record_calls: AtomicU32,
}

impl FakePlays {
    fn with_count(play_count: u32) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(PlayStatus {
                play_count,
                owner_override: false,
            }),
            mode: Mutex::new(FakeMode::Answer),
            record_failures: AtomicU32::new(0),
            record_calls: AtomicU32::new(0),
        })
    }

    fn broken() -> Arc<Self> {
        let ledger = Self::with_count(0);
        *ledger.mode.lock().unwrap() = FakeMode::Unavailable;
        ledger
    }

    fn set_status(&self, status: PlayStatus) {
        *self.status.lock().unwrap() = status;
    }

    fn set_mode(&self, mode: FakeMode) {
        *self.mode.lock().unwrap() = mode;
    }

    fn fail_next_records(&self, count: u32) {
        self.record_failures.store(count, Ordering::SeqCst);
    }

    fn record_calls(&self) -> u32 {
        self.record_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PlayCountLedger for FakePlays {
    async fn play_status(
        &self,
        _listener: &AccountId,
        _track: &TrackId,
    ) -> Result<PlayStatus, LedgerError> {
        let mode = *self.mode.lock().unwrap();
        match mode {
            FakeMode::Answer => Ok(*self.status.lock().unwrap()),
            FakeMode::Unavailable => Err(LedgerError::Unavailable("ledger offline".to_string())),
            FakeMode::Rejected => Err(LedgerError::Rejected("unknown listener".to_string())),
        }
    }

    async fn record_play(
        &self,
        _listener: &AccountId,
        _track: &TrackId,
    ) -> Result<(), LedgerError> {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        let failures = self.record_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.record_failures.store(failures - 1, Ordering::SeqCst);
            return Err(LedgerError::Unavailable("record endpoint down".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Test Utilities
// ============================================================================

/// Millisecond-scale intervals so the suite finishes quickly.
fn test_config() -> PlayerConfig {
    PlayerConfig {
        preview_duration: Duration::from_millis(200),
        preview_tick: Duration::from_millis(50),
        access_settle_delay: Duration::from_millis(40),
        record_play_delay: Duration::from_millis(50),
        external_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

fn setup_gate(
    ownership: Arc<FakeOwnership>,
    plays: Arc<FakePlays>,
) -> (AccessGate, Receiver<PlayerEvent>) {
    let bus = EventBus::new(64);
    let receiver = bus.subscribe();
    let gate = AccessGate::new(ownership, plays, bus, test_config());
    (gate, receiver)
}

fn content(s: &str) -> ContentId {
    ContentId::parse(s).unwrap()
}

fn track_media(owner: &str) -> ActiveMedia {
    ActiveMedia::from(TrackRef::new(
        TrackId::new(),
        content("bafy-track-audio"),
        AccountId::new(owner),
    ))
}

fn ad_media() -> ActiveMedia {
    ActiveMedia::from(AdRef::new(
        AdId::new(),
        content("bafy-ad-audio"),
        AccountId::new("0xsponsor"),
    ))
}

/// Waits for the first event matching `predicate`, skipping the rest.
async fn expect_event<F>(receiver: &mut Receiver<PlayerEvent>, predicate: F) -> PlayerEvent
where
    F: Fn(&PlayerEvent) -> bool,
{
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), receiver.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event bus closed");
        if predicate(&event) {
            return event;
        }
    }
}

/// Drains everything currently buffered and asserts none of it matches.
fn assert_no_event<F>(receiver: &mut Receiver<PlayerEvent>, predicate: F)
where
    F: Fn(&PlayerEvent) -> bool,
{
    while let Ok(event) = receiver.try_recv() {
        assert!(!predicate(&event), "unexpected event: {event:?}");
    }
}

fn is_preview_expired(event: &PlayerEvent) -> bool {
    matches!(
        event,
        PlayerEvent::Access(AccessEvent::PreviewExpired { .. })
    )
}

fn is_limit_reached(event: &PlayerEvent) -> bool {
    matches!(event, PlayerEvent::Access(AccessEvent::LimitReached { .. }))
}

// ============================================================================
// Anonymous Preview
// ============================================================================

#[tokio::test]
async fn test_preview_counts_down_only_while_playing() {
    let (gate, mut events) = setup_gate(FakeOwnership::with_value(0.0, 0.0), FakePlays::with_count(0));
    let track = track_media("0xuploader");

    gate.media_changed(Some(&track)).await;
    assert!(gate.authorize(&track).is_allowed());

    // Two ticks of playback, then pause with time still on the clock.
    gate.note_playback_started(&track);
    sleep(Duration::from_millis(120)).await;
    gate.note_playback_stopped();

    // Paused for longer than the whole window: the clock must not move.
    sleep(Duration::from_millis(400)).await;
    assert_no_event(&mut events, is_preview_expired);
    assert!(gate.state().can_play());

    // Resuming spends the rest of the window.
    gate.note_playback_started(&track);
    expect_event(&mut events, is_preview_expired).await;

    assert!(!gate.state().can_play());
    assert_eq!(gate.authorize(&track), PlayDecision::PreviewExpired);
}

#[tokio::test]
async fn test_preview_resets_on_track_change() {
    let (gate, mut events) = setup_gate(FakeOwnership::with_value(0.0, 0.0), FakePlays::with_count(0));
    let first = track_media("0xuploader");

    gate.media_changed(Some(&first)).await;
    gate.note_playback_started(&first);
    expect_event(&mut events, is_preview_expired).await;
    assert_eq!(gate.authorize(&first), PlayDecision::PreviewExpired);

    // A different track gets a fresh window.
    let second = track_media("0xuploader");
    gate.media_changed(Some(&second)).await;
    assert!(gate.authorize(&second).is_allowed());
    assert!(gate.state().preview_seconds_remaining > 0);
}

#[tokio::test]
async fn test_login_cancels_preview_mid_session() {
    let ownership = FakeOwnership::with_value(100.0, 0.01);
    let (gate, mut events) = setup_gate(ownership, FakePlays::with_count(0));
    let track = track_media("0xuploader");

    gate.media_changed(Some(&track)).await;
    gate.note_playback_started(&track);
    sleep(Duration::from_millis(60)).await;

    // Logging in mid-play switches to the ownership policy.
    gate.set_listener(ListenerIdentity::Authenticated(AccountId::new("0xfan")))
        .await;
    assert!(gate.state().is_owner);

    // The countdown is gone; nothing expires even past the old window.
    sleep(Duration::from_millis(400)).await;
    assert_no_event(&mut events, is_preview_expired);
    assert!(gate.state().can_play());
}

// ============================================================================
// Ownership and Quota
// ============================================================================

#[tokio::test]
async fn test_holdings_value_grants_ownership() {
    // 50 tokens at $0.002 = $0.10, over the $0.01 threshold.
    let (gate, _events) = setup_gate(FakeOwnership::with_value(50.0, 0.002), FakePlays::with_count(9));
    let track = track_media("0xuploader");

    gate.set_listener(ListenerIdentity::Authenticated(AccountId::new("0xfan")))
        .await;
    gate.media_changed(Some(&track)).await;

    assert!(gate.state().is_owner);
    assert!(gate.authorize(&track).is_allowed());
}

#[tokio::test]
async fn test_uploader_is_always_owner() {
    let (gate, _events) = setup_gate(FakeOwnership::with_value(0.0, 0.0), FakePlays::with_count(9));
    // Address case differs; AccountId normalizes both sides.
    let track = track_media("0xUpLoAdEr");

    gate.set_listener(ListenerIdentity::Authenticated(AccountId::new("0xuploader")))
        .await;
    gate.media_changed(Some(&track)).await;

    assert!(gate.state().is_owner);
    assert!(gate.authorize(&track).is_allowed());
}

#[tokio::test]
async fn test_ledger_override_grants_ownership() {
    let plays = FakePlays::with_count(9);
    plays.set_status(PlayStatus {
        play_count: 9,
        owner_override: true,
    });
    let (gate, _events) = setup_gate(FakeOwnership::with_value(0.0, 0.0), plays);
    let track = track_media("0xuploader");

    gate.set_listener(ListenerIdentity::Authenticated(AccountId::new("0xfan")))
        .await;
    gate.media_changed(Some(&track)).await;

    assert!(gate.state().is_owner);
}

#[tokio::test]
async fn test_quota_denies_after_limit() {
    let (gate, mut events) = setup_gate(FakeOwnership::with_value(0.0, 0.0), FakePlays::with_count(3));
    let track = track_media("0xuploader");

    gate.set_listener(ListenerIdentity::Authenticated(AccountId::new("0xfan")))
        .await;
    gate.media_changed(Some(&track)).await;

    match gate.authorize(&track) {
        PlayDecision::LimitReached {
            play_count,
            max_free_plays,
        } => {
            assert_eq!(play_count, 3);
            assert_eq!(max_free_plays, 3);
        }
        other => panic!("expected limit reached, got {other:?}"),
    }
    expect_event(&mut events, is_limit_reached).await;
}

#[tokio::test]
async fn test_quota_allows_under_limit() {
    let (gate, _events) = setup_gate(FakeOwnership::with_value(0.0, 0.0), FakePlays::with_count(2));
    let track = track_media("0xuploader");

    gate.set_listener(ListenerIdentity::Authenticated(AccountId::new("0xfan")))
        .await;
    gate.media_changed(Some(&track)).await;

    assert!(gate.authorize(&track).is_allowed());
    assert_eq!(gate.state().remaining_plays(), 1);
}

#[tokio::test]
async fn test_effective_count_never_decreases() {
    let plays = FakePlays::with_count(2);
    let (gate, _events) = setup_gate(FakeOwnership::with_value(0.0, 0.0), plays.clone());
    let track = track_media("0xuploader");

    gate.set_listener(ListenerIdentity::Authenticated(AccountId::new("0xfan")))
        .await;
    gate.media_changed(Some(&track)).await;
    assert_eq!(gate.state().play_count, 2);

    // An eventually-consistent ledger briefly reports an older count.
    plays.set_status(PlayStatus {
        play_count: 1,
        owner_override: false,
    });
    gate.note_dependency_changed();
    sleep(Duration::from_millis(150)).await;

    assert_eq!(gate.state().play_count, 2);
}

// ============================================================================
// Dependency Changes and Enforcement
// ============================================================================

#[tokio::test]
async fn test_purchase_applies_after_settle_delay() {
    let ownership = FakeOwnership::with_value(0.0, 0.0);
    let (gate, mut events) = setup_gate(ownership.clone(), FakePlays::with_count(1));
    let track = track_media("0xuploader");

    gate.set_listener(ListenerIdentity::Authenticated(AccountId::new("0xfan")))
        .await;
    gate.media_changed(Some(&track)).await;
    assert!(!gate.state().is_owner);

    gate.note_playback_started(&track);

    // A purchase lands; the balance change is signalled to the gate.
    ownership.set_value(10.0, 0.01);
    gate.note_dependency_changed();

    // Not yet: the settle delay has not elapsed.
    assert!(!gate.state().is_owner);

    sleep(Duration::from_millis(150)).await;
    assert!(gate.state().is_owner);

    // Turning into an owner mid-play never interrupts the session.
    assert_no_event(&mut events, is_limit_reached);
}

#[tokio::test]
async fn test_quota_exhaustion_mid_play_raises_limit_reached() {
    let plays = FakePlays::with_count(2);
    let (gate, mut events) = setup_gate(FakeOwnership::with_value(0.0, 0.0), plays.clone());
    let track = track_media("0xuploader");

    gate.set_listener(ListenerIdentity::Authenticated(AccountId::new("0xfan")))
        .await;
    gate.media_changed(Some(&track)).await;
    assert!(gate.authorize(&track).is_allowed());
    gate.note_playback_started(&track);

    // The ledger catches up past the allowance while audio is playing.
    plays.set_status(PlayStatus {
        play_count: 5,
        owner_override: false,
    });
    gate.note_dependency_changed();

    expect_event(&mut events, is_limit_reached).await;
    assert!(!gate.state().can_play());
}

// ============================================================================
// Fail-Open
// ============================================================================

#[tokio::test]
async fn test_ledger_outage_fails_open() {
    let (gate, _events) = setup_gate(FakeOwnership::broken(), FakePlays::broken());
    let track = track_media("0xuploader");

    gate.set_listener(ListenerIdentity::Authenticated(AccountId::new("0xfan")))
        .await;
    gate.media_changed(Some(&track)).await;

    let state = gate.state();
    assert!(state.degraded);
    assert!(state.can_play());
    assert!(gate.authorize(&track).is_allowed());
}

#[tokio::test]
async fn test_ledger_rejection_is_definitive() {
    let ownership = FakeOwnership::with_value(0.0, 0.0);
    ownership.set_mode(FakeMode::Rejected);
    let plays = FakePlays::with_count(0);
    plays.set_mode(FakeMode::Rejected);

    let (gate, _events) = setup_gate(ownership, plays);
    let track = track_media("0xuploader");

    gate.set_listener(ListenerIdentity::Authenticated(AccountId::new("0xfan")))
        .await;
    gate.media_changed(Some(&track)).await;

    // A rejection is an answer, not an outage.
    let state = gate.state();
    assert!(!state.degraded);
    assert!(!state.is_owner);
    assert!(state.can_play());
}

// ============================================================================
// Play Recording
// ============================================================================

#[tokio::test]
async fn test_play_recorded_once_per_session() {
    let plays = FakePlays::with_count(0);
    let (gate, mut events) = setup_gate(FakeOwnership::with_value(0.0, 0.0), plays.clone());
    let track = track_media("0xuploader");

    gate.set_listener(ListenerIdentity::Authenticated(AccountId::new("0xfan")))
        .await;
    gate.media_changed(Some(&track)).await;

    gate.note_playback_started(&track);
    expect_event(&mut events, |event| {
        matches!(event, PlayerEvent::Access(AccessEvent::PlayRecorded { .. }))
    })
    .await;
    assert_eq!(plays.record_calls(), 1);

    // Continuing the same session never records again.
    sleep(Duration::from_millis(150)).await;
    assert_eq!(plays.record_calls(), 1);

    // A new session after a stop records once more.
    gate.note_playback_stopped();
    gate.note_playback_started(&track);
    sleep(Duration::from_millis(150)).await;
    assert_eq!(plays.record_calls(), 2);
}

#[tokio::test]
async fn test_early_pause_cancels_record() {
    let plays = FakePlays::with_count(0);
    let (gate, _events) = setup_gate(FakeOwnership::with_value(0.0, 0.0), plays.clone());
    let track = track_media("0xuploader");

    gate.set_listener(ListenerIdentity::Authenticated(AccountId::new("0xfan")))
        .await;
    gate.media_changed(Some(&track)).await;

    // Paused before the debounce elapses: no record call.
    gate.note_playback_started(&track);
    sleep(Duration::from_millis(20)).await;
    gate.note_playback_stopped();

    sleep(Duration::from_millis(150)).await;
    assert_eq!(plays.record_calls(), 0);
}

#[tokio::test]
async fn test_failed_record_retries_next_session() {
    let plays = FakePlays::with_count(0);
    plays.fail_next_records(1);
    let (gate, mut events) = setup_gate(FakeOwnership::with_value(0.0, 0.0), plays.clone());
    let track = track_media("0xuploader");

    gate.set_listener(ListenerIdentity::Authenticated(AccountId::new("0xfan")))
        .await;
    gate.media_changed(Some(&track)).await;

    gate.note_playback_started(&track);
    expect_event(&mut events, |event| {
        matches!(event, PlayerEvent::Access(AccessEvent::RecordDeferred { .. }))
    })
    .await;
    assert_eq!(plays.record_calls(), 1);

    // The next session retries and succeeds.
    gate.note_playback_stopped();
    gate.note_playback_started(&track);
    expect_event(&mut events, |event| {
        matches!(event, PlayerEvent::Access(AccessEvent::PlayRecorded { .. }))
    })
    .await;
    assert_eq!(plays.record_calls(), 2);
}

// ============================================================================
// Sponsored Items
// ============================================================================

#[tokio::test]
async fn test_ads_bypass_gating() {
    let (gate, mut events) = setup_gate(FakeOwnership::with_value(0.0, 0.0), FakePlays::with_count(0));
    let track = track_media("0xuploader");

    // Burn through the anonymous preview.
    gate.media_changed(Some(&track)).await;
    gate.note_playback_started(&track);
    expect_event(&mut events, is_preview_expired).await;
    gate.note_playback_stopped();

    // The sponsored item still plays, and playing it arms no countdown.
    let ad = ad_media();
    assert!(gate.authorize(&ad).is_allowed());
    gate.note_playback_started(&ad);
    sleep(Duration::from_millis(300)).await;
    assert_no_event(&mut events, is_preview_expired);
}
