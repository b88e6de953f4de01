//! # Player Runtime
//!
//! Shared runtime services for the playback core: the typed event bus, the
//! player configuration, the bounded-retry policy, and logging setup.
//!
//! Every other `player-*` crate emits through [`events::EventBus`] and reads
//! its knobs from [`config::PlayerConfig`]; hosts call
//! [`logging::init_logging`] once during startup.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod retry;

pub use config::PlayerConfig;
pub use error::{Error, Result};
pub use events::{AccessEvent, EventBus, EventStream, PlaybackEvent, PlayerEvent, SourceEvent};
pub use retry::RetryPolicy;
