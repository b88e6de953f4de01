//! # Playback Session Layer
//!
//! The embeddable playback core: one engine slot, two producers competing
//! for it, and the policies that decide what may occupy it and what plays
//! when a source dies.
//!
//! ## Architecture
//!
//! ```text
//!                      ┌────────────────┐
//!                      │     Player     │  facade + reactor
//!                      └───┬────────┬───┘
//!              producers   │        │   policy
//!        ┌─────────────────┤        ├──────────────┐
//!        ▼                 ▼        ▼              ▼
//!  StreamProducer   arbitrator   AccessGate   PlayQueue
//!        │                 │    (player-access)
//!        └────────┬────────┘
//!                 ▼
//!        PlaybackController ── PlaybackEngine (host)
//! ```
//!
//! - [`controller::PlaybackController`] drives the engine and owns source
//!   failover.
//! - The arbitrator keeps the continuous stream and the on-demand queue
//!   mutually exclusive.
//! - [`player::Player`] is the host-facing facade; its reactor routes bus
//!   events into gate bookkeeping, enforcement pauses, and queue advance.
//! - [`state::PlaybackStateHandle`] is the shared snapshot every surface
//!   renders from.
//!
//! ## Example
//!
//! ```ignore
//! use player_session::{Player, PlayerDependencies};
//! use player_runtime::PlayerConfig;
//!
//! # async fn run(deps: PlayerDependencies) -> player_session::Result<()> {
//! let player = Player::new(deps, PlayerConfig::default())?;
//! player.listen_stream().await?;
//! # Ok(())
//! # }
//! ```

mod arbitrator;
pub mod controller;
pub mod error;
mod launch;
pub mod player;
pub mod queue;
pub mod session;
pub mod state;
mod stream;
mod task;

pub use controller::PlaybackController;
pub use error::{PlaybackError, Result};
pub use player::{Player, PlayerDependencies};
pub use queue::{AdvanceReason, PlayQueue, RepeatMode};
pub use session::PlaybackSession;
pub use state::{PlaybackSnapshot, PlaybackStateHandle};

// The access types hosts handle directly, re-exported so embedding the
// session layer does not require a direct player-access dependency.
pub use player_access::{AccessState, ListenerIdentity, PlayDecision};
