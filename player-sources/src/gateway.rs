//! Gateway endpoints and the configured gateway set.

use player_bridge::{ContentId, SourceUrl};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One gateway endpoint able to serve any content identifier.
///
/// The base is stored without a trailing slash so URL rendering is uniform.
///
/// # Examples
///
/// ```
/// use player_sources::Gateway;
/// use player_bridge::ContentId;
///
/// let gw = Gateway::new("https://gw.example.net/content/");
/// let cid = ContentId::parse("bafy123").unwrap();
/// assert_eq!(gw.url_for(&cid).as_str(), "https://gw.example.net/content/bafy123");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Gateway {
    base: String,
}

impl Gateway {
    /// Create a gateway from its base endpoint
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self { base }
    }

    /// The normalized base endpoint
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Render the fetch URL for `content` on this gateway
    pub fn url_for(&self, content: &ContentId) -> SourceUrl {
        SourceUrl::new(format!("{}/{}", self.base, content.as_str()))
    }

    /// Whether the base parses as an absolute http(s) URL
    pub fn is_well_formed(&self) -> bool {
        match url::Url::parse(&self.base) {
            Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
            Err(_) => false,
        }
    }
}

impl fmt::Display for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)
    }
}

impl From<String> for Gateway {
    fn from(base: String) -> Self {
        Self::new(base)
    }
}

impl From<Gateway> for String {
    fn from(gw: Gateway) -> Self {
        gw.base
    }
}

/// The configured set of gateways: an optional proxy relay, an optional
/// preferred direct gateway, and any number of alternates.
///
/// All slots are optional; an entirely empty set is legal configuration and
/// simply resolves every content id to no candidates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewaySet {
    /// Same-origin relay, tried first when present (avoids CORS and mixed
    /// content on web hosts)
    #[serde(default)]
    pub proxy: Option<Gateway>,

    /// Preferred direct gateway
    #[serde(default)]
    pub preferred: Option<Gateway>,

    /// Additional direct gateways, in priority order
    #[serde(default)]
    pub alternates: Vec<Gateway>,
}

impl GatewaySet {
    /// A set with only a preferred gateway
    pub fn single(preferred: Gateway) -> Self {
        Self {
            proxy: None,
            preferred: Some(preferred),
            alternates: Vec::new(),
        }
    }

    /// Whether no gateway is configured at all
    pub fn is_empty(&self) -> bool {
        self.proxy.is_none() && self.preferred.is_none() && self.alternates.is_empty()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        for (slot, gateway) in self.slots() {
            if !gateway.is_well_formed() {
                return Err(format!(
                    "{} gateway '{}' is not an absolute http(s) URL",
                    slot, gateway
                ));
            }
        }
        Ok(())
    }

    fn slots(&self) -> impl Iterator<Item = (&'static str, &Gateway)> {
        self.proxy
            .iter()
            .map(|g| ("proxy", g))
            .chain(self.preferred.iter().map(|g| ("preferred", g)))
            .chain(self.alternates.iter().map(|g| ("alternate", g)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_is_normalized_without_trailing_slash() {
        assert_eq!(Gateway::new("https://gw.one/").base(), "https://gw.one");
        assert_eq!(Gateway::new("https://gw.one///").base(), "https://gw.one");
        assert_eq!(Gateway::new("https://gw.one").base(), "https://gw.one");
    }

    #[test]
    fn url_rendering_joins_with_single_slash() {
        let cid = ContentId::parse("bafyxyz").unwrap();
        let url = Gateway::new("https://gw.one/ipfs/").url_for(&cid);
        assert_eq!(url.as_str(), "https://gw.one/ipfs/bafyxyz");
    }

    #[test]
    fn well_formedness_requires_absolute_http() {
        assert!(Gateway::new("https://gw.one").is_well_formed());
        assert!(Gateway::new("http://localhost:8080").is_well_formed());
        assert!(!Gateway::new("ftp://gw.one").is_well_formed());
        assert!(!Gateway::new("not a url").is_well_formed());
    }

    #[test]
    fn empty_set_is_detected() {
        assert!(GatewaySet::default().is_empty());
        assert!(!GatewaySet::single(Gateway::new("https://gw.one")).is_empty());
    }

    #[test]
    fn validation_names_the_bad_slot() {
        let set = GatewaySet {
            proxy: Some(Gateway::new("https://relay.example")),
            preferred: Some(Gateway::new("nonsense")),
            alternates: vec![],
        };
        let err = set.validate().unwrap_err();
        assert!(err.contains("preferred"));
    }

    #[test]
    fn deserializes_from_plain_strings() {
        let set: GatewaySet = serde_json::from_str(
            r#"{
                "proxy": "https://relay.example/fetch/",
                "preferred": "https://gw.one",
                "alternates": ["https://gw.two", "https://gw.three"]
            }"#,
        )
        .unwrap();

        assert_eq!(set.proxy.as_ref().unwrap().base(), "https://relay.example/fetch");
        assert_eq!(set.alternates.len(), 2);
        assert!(set.validate().is_ok());
    }
}
