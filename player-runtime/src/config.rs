//! # Player Configuration
//!
//! Tunables for the playback core: access-policy knobs, retry/timeout
//! behavior, and snapshot cadence.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Playback core configuration.
///
/// Every field has a serde default, so hosts deserialize partial documents
/// and get the production values for everything omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Preview window granted to anonymous listeners.
    ///
    /// Default: 20 seconds.
    #[serde(default = "default_preview_duration")]
    pub preview_duration: Duration,

    /// Cadence of the preview countdown.
    ///
    /// The countdown only advances while playing; tests shrink this instead
    /// of faking a clock.
    ///
    /// Default: 1 second.
    #[serde(default = "default_preview_tick")]
    pub preview_tick: Duration,

    /// Free plays per (listener, track) before ownership is required.
    ///
    /// Default: 3.
    #[serde(default = "default_max_free_plays")]
    pub max_free_plays: u32,

    /// USD value of track-token holdings that grants unlimited plays.
    ///
    /// Default: $0.01.
    #[serde(default = "default_ownership_threshold_usd")]
    pub ownership_threshold_usd: f64,

    /// Settle delay before re-reading ledgers after a balance/price change.
    ///
    /// Reading immediately after a purchase observes the stale balance.
    ///
    /// Default: 500 ms.
    #[serde(default = "default_access_settle_delay")]
    pub access_settle_delay: Duration,

    /// Continuous playback required before a play is recorded.
    ///
    /// Debounces accidental taps out of the play count.
    ///
    /// Default: 2 seconds.
    #[serde(default = "default_record_play_delay")]
    pub record_play_delay: Duration,

    /// Delay before retrying a transiently aborted engine call.
    ///
    /// Default: 100 ms.
    #[serde(default = "default_transient_retry_delay")]
    pub transient_retry_delay: Duration,

    /// Total attempts for a transiently aborted engine call (first try
    /// included).
    ///
    /// Default: 2 (one retry).
    #[serde(default = "default_transient_retry_attempts")]
    pub transient_retry_attempts: u32,

    /// Hard timeout on externally triggered operations (ledger reads,
    /// record calls) so the host UI never hangs on a dead endpoint.
    ///
    /// Default: 120 seconds.
    #[serde(default = "default_external_timeout")]
    pub external_timeout: Duration,

    /// Sampling interval of the engine position poll feeding the shared
    /// snapshot.
    ///
    /// Default: 250 ms.
    #[serde(default = "default_position_poll_interval")]
    pub position_poll_interval: Duration,

    /// Volume applied when no host preference exists yet, in `[0.0, 1.0]`.
    ///
    /// Default: 1.0.
    #[serde(default = "default_volume")]
    pub default_volume: f32,

    /// Event bus buffer size per subscriber.
    ///
    /// Default: 100.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            preview_duration: default_preview_duration(),
            preview_tick: default_preview_tick(),
            max_free_plays: default_max_free_plays(),
            ownership_threshold_usd: default_ownership_threshold_usd(),
            access_settle_delay: default_access_settle_delay(),
            record_play_delay: default_record_play_delay(),
            transient_retry_delay: default_transient_retry_delay(),
            transient_retry_attempts: default_transient_retry_attempts(),
            external_timeout: default_external_timeout(),
            position_poll_interval: default_position_poll_interval(),
            default_volume: default_volume(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl PlayerConfig {
    /// Create a configuration tuned for snappy UI feedback.
    ///
    /// - Faster position sampling (100 ms)
    /// - Shorter settle delay (200 ms)
    /// - Tighter external timeout (30 s)
    pub fn low_latency() -> Self {
        Self {
            position_poll_interval: Duration::from_millis(100),
            access_settle_delay: Duration::from_millis(200),
            external_timeout: Duration::from_secs(30),
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.preview_duration.is_zero() {
            return Err("preview_duration must be > 0".to_string());
        }

        if self.preview_tick.is_zero() || self.preview_tick > self.preview_duration {
            return Err("preview_tick must be > 0 and at most preview_duration".to_string());
        }

        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err("default_volume must be between 0.0 and 1.0".to_string());
        }

        if self.ownership_threshold_usd < 0.0 {
            return Err("ownership_threshold_usd cannot be negative".to_string());
        }

        if self.transient_retry_attempts == 0 {
            return Err("transient_retry_attempts must be >= 1".to_string());
        }

        if self.position_poll_interval.is_zero() {
            return Err("position_poll_interval must be > 0".to_string());
        }

        if self.external_timeout.is_zero() {
            return Err("external_timeout must be > 0".to_string());
        }

        if self.event_buffer == 0 {
            return Err("event_buffer must be > 0".to_string());
        }

        Ok(())
    }

    /// Retry policy for transiently aborted engine calls.
    pub fn transient_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.transient_retry_attempts, self.transient_retry_delay)
    }

    /// Preview window expressed in whole countdown seconds.
    pub fn preview_seconds(&self) -> u32 {
        self.preview_duration.as_secs() as u32
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_preview_duration() -> Duration {
    Duration::from_secs(20)
}

fn default_preview_tick() -> Duration {
    Duration::from_secs(1)
}

fn default_max_free_plays() -> u32 {
    3
}

fn default_ownership_threshold_usd() -> f64 {
    0.01
}

fn default_access_settle_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_record_play_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_transient_retry_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_transient_retry_attempts() -> u32 {
    2
}

fn default_external_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_position_poll_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_volume() -> f32 {
    1.0
}

fn default_event_buffer() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PlayerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.preview_seconds(), 20);
        assert_eq!(config.max_free_plays, 3);
        assert_eq!(config.external_timeout, Duration::from_secs(120));
    }

    #[test]
    fn low_latency_preset_is_valid() {
        let config = PlayerConfig::low_latency();
        assert!(config.validate().is_ok());
        assert!(config.position_poll_interval < PlayerConfig::default().position_poll_interval);
    }

    #[test]
    fn rejects_zero_preview() {
        let config = PlayerConfig {
            preview_duration: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_tick_longer_than_window() {
        let config = PlayerConfig {
            preview_duration: Duration::from_secs(5),
            preview_tick: Duration::from_secs(10),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_volume() {
        let config = PlayerConfig {
            default_volume: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_document_fills_defaults() {
        let config: PlayerConfig = serde_json::from_str(r#"{"max_free_plays": 5}"#).unwrap();
        assert_eq!(config.max_free_plays, 5);
        assert_eq!(config.preview_duration, Duration::from_secs(20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn transient_retry_policy_reflects_config() {
        let config = PlayerConfig::default();
        let policy = config.transient_retry_policy();
        assert_eq!(policy.max_attempts(), 2);
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
    }
}
