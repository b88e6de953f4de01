//! # Source Resolution
//!
//! Turns a content identifier into the ordered list of candidate URLs the
//! playback controller walks on failure.
//!
//! The content-addressed network serves the same bytes from many gateways;
//! which ones are worth trying, and in what order, is policy:
//!
//! 1. the proxy relay (same-origin, CORS-friendly) when configured,
//! 2. the preferred direct gateway,
//! 3. up to N alternates, N coming from the connection-quality classifier.
//!
//! The result is de-duplicated by exact URL, preserving first-seen order,
//! and is empty exactly when no gateway is configured — callers refuse
//! playback instead of loading an empty source list.

pub mod gateway;
pub mod resolver;

pub use gateway::{Gateway, GatewaySet};
pub use resolver::SourceResolver;
