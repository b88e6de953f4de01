//! # Player Access
//!
//! Listen-access policy for the playback core: the anonymous preview
//! window, ownership-based unlimited plays, the free-play quota, and play
//! recording.
//!
//! The crate exposes one engine, [`AccessGate`], driven entirely by calls
//! from the session layer and the host:
//!
//! | Input | Effect |
//! |-------|--------|
//! | [`AccessGate::set_listener`] | identity switch, immediate re-evaluation |
//! | [`AccessGate::media_changed`] | preview/record reset, immediate re-evaluation |
//! | [`AccessGate::authorize`] | admission decision for a play attempt |
//! | [`AccessGate::note_playback_started`] | countdown / record timer arming |
//! | [`AccessGate::note_playback_stopped`] | countdown freeze, record reset |
//! | [`AccessGate::note_dependency_changed`] | settle-delayed ledger re-read |
//!
//! Decisions come back synchronously as [`PlayDecision`]; everything
//! asynchronous (expiry, quota enforcement, record outcomes) surfaces as
//! `AccessEvent`s on the shared event bus.

pub mod gate;
pub mod types;

pub use gate::AccessGate;
pub use types::{AccessState, ListenerIdentity, PlayDecision};
