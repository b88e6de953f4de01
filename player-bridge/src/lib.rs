//! # Host Bridge Traits
//!
//! Abstraction traits that must be implemented by the host embedding the
//! playback core, plus the shared media domain types they exchange.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and everything
//! it cannot (and should not) implement itself: the audio engine, the
//! platform's ledgers, the track catalog, the stream schedule, and the
//! network probe. Each trait represents a capability the core requires but
//! that is provided differently per host (web player, desktop shell, kiosk).
//!
//! ## Traits
//!
//! ### Playback
//! - [`PlaybackEngine`](engine::PlaybackEngine) - The single audio engine handle:
//!   load/play/pause/seek/volume
//!
//! ### Platform data
//! - [`TrackDirectory`](directory::TrackDirectory) - Track metadata lookup
//! - [`StreamFeed`](directory::StreamFeed) - Schedule of the continuous stream
//! - [`OwnershipLedger`](ledger::OwnershipLedger) - Token balance and price per (listener, track)
//! - [`PlayCountLedger`](ledger::PlayCountLedger) - Play counting and quota status
//!
//! ### Environment
//! - [`ConnectionMonitor`](network::ConnectionMonitor) - Connection-quality classification
//!   driving gateway fan-out
//!
//! ## Ownership rules
//!
//! The [`PlaybackEngine`](engine::PlaybackEngine) handle is exclusively owned
//! by the playback controller in `player-session`; no other component may
//! call it. Ledger and directory traits are shared read-mostly services and
//! may be called concurrently.

pub mod directory;
pub mod engine;
pub mod ledger;
pub mod media;
pub mod network;

pub use directory::{
    DirectoryError, StreamFeed, StreamItem, StreamItemStream, TrackDetails, TrackDirectory,
};
pub use engine::{EngineError, EngineStatus, MediaInfo, PlaybackEngine};
pub use ledger::{Holdings, LedgerError, OwnershipLedger, PlayCountLedger, PlayStatus};
pub use media::{
    AccountId, ActiveMedia, AdId, AdRef, ContentId, InvalidContentId, MediaId, ProducerKind,
    SourceUrl, TrackId, TrackRef,
};
pub use network::{ConnectionMonitor, LinkQuality};
