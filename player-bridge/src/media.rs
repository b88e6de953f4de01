//! Media identity and reference types shared across the playback core.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a track in the platform catalog.
///
/// # Examples
///
/// ```
/// use player_bridge::TrackId;
///
/// // Create a new track ID
/// let track_id = TrackId::new();
///
/// // Parse from string
/// let id_str = "550e8400-e29b-41d4-a716-446655440000";
/// let track_id = TrackId::from_string(id_str).unwrap();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(Uuid);

impl TrackId {
    /// Create a new random track ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a track ID from a string
    ///
    /// # Arguments
    ///
    /// * `s` - UUID string representation
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for TrackId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Unique identifier for a sponsored item that can occupy the playback slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdId(Uuid);

impl AdId {
    /// Create a new random ad ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an ad ID from a string
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AdId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AdId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Identifier of either occupant of the playback slot.
///
/// Snapshot consumers compare this against their own id to decide whether
/// they represent the currently active media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id")]
pub enum MediaId {
    /// A catalog track
    Track(TrackId),
    /// A sponsored item
    Ad(AdId),
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaId::Track(id) => write!(f, "track:{id}"),
            MediaId::Ad(id) => write!(f, "ad:{id}"),
        }
    }
}

/// Platform account identity (listener or track owner).
///
/// Identities are address strings compared case-insensitively by the
/// platform, so the constructor normalizes to lowercase and equality is
/// exact afterwards.
///
/// # Examples
///
/// ```
/// use player_bridge::AccountId;
///
/// let a = AccountId::new("0xABCDEF0123");
/// let b = AccountId::new("0xabcdef0123");
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Create an account ID, normalizing the address to lowercase
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into().to_lowercase())
    }

    /// Get the normalized address string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AccountId {
    fn from(address: String) -> Self {
        Self::new(address)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

/// Error returned when parsing an empty content identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("content identifier is empty")]
pub struct InvalidContentId;

/// Immutable address of media content on the content-addressed storage
/// network.
///
/// A content identifier names the bytes, not a location; any configured
/// gateway can serve it. The identifier is guaranteed non-empty, so source
/// resolution never has to re-check for blank input.
///
/// # Examples
///
/// ```
/// use player_bridge::ContentId;
///
/// let cid = ContentId::parse("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi").unwrap();
/// assert!(ContentId::parse("").is_err());
/// # let _ = cid;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(String);

impl ContentId {
    /// Parse a content identifier, rejecting empty input
    ///
    /// # Errors
    ///
    /// Returns [`InvalidContentId`] if the trimmed input is empty.
    pub fn parse(s: impl Into<String>) -> Result<Self, InvalidContentId> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(InvalidContentId);
        }
        Ok(Self(s))
    }

    /// Get the identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ContentId {
    type Error = InvalidContentId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<ContentId> for String {
    fn from(id: ContentId) -> Self {
        id.0
    }
}

/// A fully resolved URL an engine can load.
///
/// Equality is exact string match; the resolver relies on this for
/// de-duplicating candidate lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceUrl(String);

impl SourceUrl {
    /// Wrap a resolved URL
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Get the URL string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which producer currently drives the playback slot.
///
/// Producers are mutually exclusive; the arbitrator guarantees at most one
/// is active at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProducerKind {
    /// The continuous shared stream
    Stream,
    /// A listener-selected queue
    OnDemand,
}

impl ProducerKind {
    /// Identifier string used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ProducerKind::Stream => "stream",
            ProducerKind::OnDemand => "on_demand",
        }
    }
}

impl fmt::Display for ProducerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a catalog track occupying (or about to occupy) the playback
/// slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRef {
    /// Catalog id of the track
    pub id: TrackId,
    /// Content identifier of the audio payload
    pub audio_content_id: ContentId,
    /// Content identifier of the cover image, when one exists
    pub cover_content_id: Option<ContentId>,
    /// Identity of the track owner (the artist account)
    pub owner: AccountId,
    /// Token ticker for tracks with an attached token
    pub ticker: Option<String>,
}

impl TrackRef {
    /// Create a track reference with the mandatory fields
    pub fn new(id: TrackId, audio_content_id: ContentId, owner: AccountId) -> Self {
        Self {
            id,
            audio_content_id,
            cover_content_id: None,
            owner,
            ticker: None,
        }
    }

    /// Attach a cover content identifier
    pub fn with_cover(mut self, cover: ContentId) -> Self {
        self.cover_content_id = Some(cover);
        self
    }

    /// Attach a token ticker
    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = Some(ticker.into());
        self
    }
}

/// Reference to a sponsored item occupying the playback slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdRef {
    /// Id of the sponsored item
    pub id: AdId,
    /// Content identifier of the audio payload
    pub audio_content_id: ContentId,
    /// Content identifier of the cover image, when one exists
    pub cover_content_id: Option<ContentId>,
    /// Identity of the sponsoring account
    pub owner: AccountId,
}

impl AdRef {
    /// Create an ad reference with the mandatory fields
    pub fn new(id: AdId, audio_content_id: ContentId, owner: AccountId) -> Self {
        Self {
            id,
            audio_content_id,
            cover_content_id: None,
            owner,
        }
    }

    /// Attach a cover content identifier
    pub fn with_cover(mut self, cover: ContentId) -> Self {
        self.cover_content_id = Some(cover);
        self
    }
}

/// The occupant of the playback slot.
///
/// Tracks and sponsored items are mutually exclusive: at any instant the
/// slot holds at most one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ActiveMedia {
    /// A catalog track
    Track(TrackRef),
    /// A sponsored item
    Ad(AdRef),
}

impl ActiveMedia {
    /// Id of the occupant, in the discriminated form snapshot readers compare
    pub fn media_id(&self) -> MediaId {
        match self {
            ActiveMedia::Track(t) => MediaId::Track(t.id),
            ActiveMedia::Ad(a) => MediaId::Ad(a.id),
        }
    }

    /// Content identifier of the audio payload
    pub fn audio_content_id(&self) -> &ContentId {
        match self {
            ActiveMedia::Track(t) => &t.audio_content_id,
            ActiveMedia::Ad(a) => &a.audio_content_id,
        }
    }

    /// Identity of the owning account
    pub fn owner(&self) -> &AccountId {
        match self {
            ActiveMedia::Track(t) => &t.owner,
            ActiveMedia::Ad(a) => &a.owner,
        }
    }

    /// The track reference, when the occupant is a track
    pub fn as_track(&self) -> Option<&TrackRef> {
        match self {
            ActiveMedia::Track(t) => Some(t),
            ActiveMedia::Ad(_) => None,
        }
    }

    /// Whether the occupant is a sponsored item
    pub fn is_ad(&self) -> bool {
        matches!(self, ActiveMedia::Ad(_))
    }
}

impl From<TrackRef> for ActiveMedia {
    fn from(track: TrackRef) -> Self {
        ActiveMedia::Track(track)
    }
}

impl From<AdRef> for ActiveMedia {
    fn from(ad: AdRef) -> Self {
        ActiveMedia::Ad(ad)
    }
}
