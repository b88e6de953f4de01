//! Ledger Abstractions
//!
//! Async reads of ownership value and play counts. Both ledgers live on the
//! platform side; the core never persists either locally.

use crate::media::{AccountId, TrackId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors from ledger queries.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The ledger endpoint could not be reached or answered with a server
    /// failure.
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    /// The query ran past the hard timeout.
    #[error("Ledger query timed out after {0:?}")]
    Timeout(Duration),

    /// The ledger understood the request and refused it.
    #[error("Ledger rejected the request: {0}")]
    Rejected(String),
}

impl LedgerError {
    /// Returns `true` if a later identical query may succeed.
    ///
    /// Transient failures are what the access gate fails open on; a
    /// [`LedgerError::Rejected`] is a real answer, not an outage.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Unavailable(_) | LedgerError::Timeout(_))
    }
}

/// A listener's token position for one track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Holdings {
    /// Token balance held by the listener
    pub token_balance: f64,
    /// Current price of one token in USD
    pub token_price_usd: f64,
}

impl Holdings {
    /// A zero position
    pub fn none() -> Self {
        Self {
            token_balance: 0.0,
            token_price_usd: 0.0,
        }
    }

    /// USD value of the position, the quantity ownership eligibility is
    /// derived from
    pub fn value_usd(&self) -> f64 {
        self.token_balance * self.token_price_usd
    }
}

/// Read access to the token ownership ledger.
///
/// Balance and price move independently (purchases, bonding-curve price
/// changes), so callers re-query rather than caching; the access gate
/// applies its own settle delay around dependency changes.
#[async_trait]
pub trait OwnershipLedger: Send + Sync {
    /// Current holdings of `listener` in the token attached to `track`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Unavailable`] or [`LedgerError::Timeout`] on
    /// transient failure; callers decide whether to fail open.
    async fn holdings(&self, listener: &AccountId, track: &TrackId) -> Result<Holdings, LedgerError>;
}

/// Per-listener play standing for one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayStatus {
    /// Number of plays the ledger has recorded for (listener, track)
    pub play_count: u32,
    /// Ledger-side ownership override (e.g. full rights purchased)
    pub owner_override: bool,
}

/// Play counting and quota status.
///
/// `record_play` is idempotent per play session on the ledger side, so the
/// retry-after-failure path cannot double-count.
#[async_trait]
pub trait PlayCountLedger: Send + Sync {
    /// Play count and ownership override for `(listener, track)`.
    async fn play_status(
        &self,
        listener: &AccountId,
        track: &TrackId,
    ) -> Result<PlayStatus, LedgerError>;

    /// Record one play of `track` by `listener`.
    ///
    /// # Errors
    ///
    /// A failed record is non-fatal; the caller re-arms its record flag and
    /// the next play session retries.
    async fn record_play(&self, listener: &AccountId, track: &TrackId) -> Result<(), LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holdings_value_is_balance_times_price() {
        let holdings = Holdings {
            token_balance: 50.0,
            token_price_usd: 0.002,
        };
        assert!((holdings.value_usd() - 0.1).abs() < f64::EPSILON);
        assert_eq!(Holdings::none().value_usd(), 0.0);
    }

    #[test]
    fn only_outages_are_transient() {
        assert!(LedgerError::Unavailable("503".into()).is_transient());
        assert!(LedgerError::Timeout(Duration::from_secs(120)).is_transient());
        assert!(!LedgerError::Rejected("unknown track".into()).is_transient());
    }
}
