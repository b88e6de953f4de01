use std::time::Duration;

use player_bridge::AccountId;
use serde::{Deserialize, Serialize};

// ============================================================================
// Listener Identity
// ============================================================================

/// Who is listening right now.
///
/// The gate applies the anonymous preview window to [`ListenerIdentity::Anonymous`]
/// and the ownership / play-quota rules to [`ListenerIdentity::Authenticated`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "account", rename_all = "snake_case")]
pub enum ListenerIdentity {
    Anonymous,
    Authenticated(AccountId),
}

impl ListenerIdentity {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, ListenerIdentity::Authenticated(_))
    }

    /// Account of an authenticated listener, `None` for anonymous sessions.
    pub fn account(&self) -> Option<&AccountId> {
        match self {
            ListenerIdentity::Anonymous => None,
            ListenerIdentity::Authenticated(account) => Some(account),
        }
    }
}

impl Default for ListenerIdentity {
    fn default() -> Self {
        ListenerIdentity::Anonymous
    }
}

impl From<AccountId> for ListenerIdentity {
    fn from(account: AccountId) -> Self {
        ListenerIdentity::Authenticated(account)
    }
}

// ============================================================================
// Access State
// ============================================================================

/// Snapshot of the gate's most recent evaluation for the current track.
///
/// `degraded` is set when a ledger read failed or timed out; the gate then
/// fails open, so `can_play` reports `true` until a clean read lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessState {
    pub is_authenticated: bool,
    /// Whole seconds left in the anonymous preview window, rounded up.
    pub preview_seconds_remaining: u32,
    pub play_count: u32,
    pub max_free_plays: u32,
    pub is_owner: bool,
    pub degraded: bool,
}

impl AccessState {
    /// Fresh anonymous state with a full preview window.
    pub fn anonymous(preview_seconds: u32, max_free_plays: u32) -> Self {
        AccessState {
            is_authenticated: false,
            preview_seconds_remaining: preview_seconds,
            play_count: 0,
            max_free_plays,
            is_owner: false,
            degraded: false,
        }
    }

    /// Authenticated state before any ledger read has completed.
    pub fn authenticated(max_free_plays: u32) -> Self {
        AccessState {
            is_authenticated: true,
            preview_seconds_remaining: 0,
            play_count: 0,
            max_free_plays,
            is_owner: false,
            degraded: false,
        }
    }

    pub fn remaining_plays(&self) -> u32 {
        self.max_free_plays.saturating_sub(self.play_count)
    }

    /// Whether starting (or continuing) playback is allowed under this state.
    ///
    /// Anonymous listeners may play while preview time remains. Authenticated
    /// listeners may play if they own the track or still have free plays.
    /// Degraded reads always allow playback.
    pub fn can_play(&self) -> bool {
        if self.degraded {
            return true;
        }
        if self.is_authenticated {
            self.is_owner || self.play_count < self.max_free_plays
        } else {
            self.preview_seconds_remaining > 0
        }
    }
}

// ============================================================================
// Play Decision
// ============================================================================

/// Outcome of an admission check before playback starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayDecision {
    Allowed,
    /// Anonymous preview window has been used up.
    PreviewExpired,
    /// Authenticated listener has exhausted the free-play quota.
    LimitReached { play_count: u32, max_free_plays: u32 },
}

impl PlayDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PlayDecision::Allowed)
    }
}

/// Rounds a duration up to whole seconds for display.
pub(crate) fn seconds_ceil(duration: Duration) -> u32 {
    let secs = duration.as_secs();
    let secs = if duration.subsec_nanos() > 0 { secs + 1 } else { secs };
    u32::try_from(secs).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_can_play_while_preview_remains() {
        let mut state = AccessState::anonymous(20, 3);
        assert!(state.can_play());
        state.preview_seconds_remaining = 0;
        assert!(!state.can_play());
    }

    #[test]
    fn authenticated_quota_and_ownership() {
        let mut state = AccessState::authenticated(3);
        state.play_count = 2;
        assert!(state.can_play());
        assert_eq!(state.remaining_plays(), 1);

        state.play_count = 3;
        assert!(!state.can_play());
        assert_eq!(state.remaining_plays(), 0);

        state.is_owner = true;
        assert!(state.can_play());
    }

    #[test]
    fn degraded_state_fails_open() {
        let mut state = AccessState::authenticated(3);
        state.play_count = 5;
        state.degraded = true;
        assert!(state.can_play());
    }

    #[test]
    fn listener_identity_accessors() {
        let anon = ListenerIdentity::Anonymous;
        assert!(!anon.is_authenticated());
        assert!(anon.account().is_none());

        let account = AccountId::new("0xAbC");
        let auth = ListenerIdentity::from(account.clone());
        assert!(auth.is_authenticated());
        assert_eq!(auth.account(), Some(&account));
    }

    #[test]
    fn seconds_round_up() {
        assert_eq!(seconds_ceil(Duration::ZERO), 0);
        assert_eq!(seconds_ceil(Duration::from_millis(1)), 1);
        assert_eq!(seconds_ceil(Duration::from_secs(20)), 20);
        assert_eq!(seconds_ceil(Duration::from_millis(19_500)), 20);
    }
}
