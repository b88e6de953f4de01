//! Cancellation bookkeeping for single-slot background tasks.

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Replaces the token in `slot`, cancelling whatever was armed before.
pub(crate) fn arm(slot: &Mutex<Option<CancellationToken>>) -> CancellationToken {
    let token = CancellationToken::new();
    if let Some(previous) = slot.lock().replace(token.clone()) {
        previous.cancel();
    }
    token
}

/// Cancels and clears the token in `slot`, if any.
pub(crate) fn disarm(slot: &Mutex<Option<CancellationToken>>) {
    if let Some(token) = slot.lock().take() {
        token.cancel();
    }
}
