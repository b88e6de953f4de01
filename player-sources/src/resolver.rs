//! Candidate source resolution.

use player_bridge::{ContentId, SourceUrl};
use tracing::debug;

use crate::gateway::GatewaySet;

/// Resolves content identifiers into ordered, de-duplicated candidate URL
/// lists.
///
/// Pure with respect to its configured gateway set: the same (content id,
/// alternate count) input always yields the same list.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    gateways: GatewaySet,
}

impl SourceResolver {
    /// Create a resolver over a configured gateway set
    pub fn new(gateways: GatewaySet) -> Self {
        Self { gateways }
    }

    /// The configured gateway set
    pub fn gateways(&self) -> &GatewaySet {
        &self.gateways
    }

    /// Build the candidate list for `content`.
    ///
    /// Order: proxy relay, preferred direct gateway, then up to
    /// `alternate_count` alternates. Exact-match duplicates keep their
    /// first-seen position. An empty gateway set yields an empty list;
    /// callers must refuse playback rather than load an empty source.
    pub fn resolve(&self, content: &ContentId, alternate_count: usize) -> Vec<SourceUrl> {
        let mut candidates: Vec<SourceUrl> = Vec::new();

        let mut push_unique = |url: SourceUrl, candidates: &mut Vec<SourceUrl>| {
            if !candidates.contains(&url) {
                candidates.push(url);
            }
        };

        if let Some(proxy) = &self.gateways.proxy {
            push_unique(proxy.url_for(content), &mut candidates);
        }

        if let Some(preferred) = &self.gateways.preferred {
            push_unique(preferred.url_for(content), &mut candidates);
        }

        for alternate in self.gateways.alternates.iter().take(alternate_count) {
            push_unique(alternate.url_for(content), &mut candidates);
        }

        debug!(
            content = %content,
            candidates = candidates.len(),
            alternates_allowed = alternate_count,
            "resolved candidate sources"
        );

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Gateway;

    fn cid() -> ContentId {
        ContentId::parse("bafybeieaudio").unwrap()
    }

    fn full_set() -> GatewaySet {
        GatewaySet {
            proxy: Some(Gateway::new("https://relay.example/fetch")),
            preferred: Some(Gateway::new("https://gw.one")),
            alternates: vec![
                Gateway::new("https://gw.two"),
                Gateway::new("https://gw.three"),
                Gateway::new("https://gw.four"),
            ],
        }
    }

    #[test]
    fn proxy_leads_then_preferred_then_alternates() {
        let resolver = SourceResolver::new(full_set());
        let urls = resolver.resolve(&cid(), 2);

        let rendered: Vec<&str> = urls.iter().map(|u| u.as_str()).collect();
        assert_eq!(
            rendered,
            vec![
                "https://relay.example/fetch/bafybeieaudio",
                "https://gw.one/bafybeieaudio",
                "https://gw.two/bafybeieaudio",
                "https://gw.three/bafybeieaudio",
            ]
        );
    }

    #[test]
    fn any_configured_gateway_yields_nonempty_result() {
        let sets = [
            GatewaySet {
                proxy: Some(Gateway::new("https://relay.example")),
                ..Default::default()
            },
            GatewaySet::single(Gateway::new("https://gw.one")),
            GatewaySet {
                alternates: vec![Gateway::new("https://gw.two")],
                ..Default::default()
            },
        ];

        for set in sets {
            let urls = SourceResolver::new(set).resolve(&cid(), 4);
            assert!(!urls.is_empty());
        }
    }

    #[test]
    fn duplicates_are_dropped_preserving_first_seen_order() {
        let set = GatewaySet {
            proxy: Some(Gateway::new("https://gw.one")),
            preferred: Some(Gateway::new("https://gw.one/")),
            alternates: vec![Gateway::new("https://gw.two"), Gateway::new("https://gw.one")],
        };
        let urls = SourceResolver::new(set).resolve(&cid(), 8);

        let rendered: Vec<&str> = urls.iter().map(|u| u.as_str()).collect();
        assert_eq!(
            rendered,
            vec!["https://gw.one/bafybeieaudio", "https://gw.two/bafybeieaudio"]
        );
    }

    #[test]
    fn alternate_count_truncates_the_tail() {
        let resolver = SourceResolver::new(full_set());

        assert_eq!(resolver.resolve(&cid(), 0).len(), 2);
        assert_eq!(resolver.resolve(&cid(), 1).len(), 3);
        // Asking for more alternates than configured is not an error.
        assert_eq!(resolver.resolve(&cid(), 64).len(), 5);
    }

    #[test]
    fn empty_gateway_set_resolves_to_no_candidates() {
        let resolver = SourceResolver::new(GatewaySet::default());
        assert!(resolver.resolve(&cid(), 4).is_empty());
    }

    #[test]
    fn results_are_duplicate_free_for_every_fan_out() {
        let resolver = SourceResolver::new(full_set());

        for n in 0..=5 {
            let urls = resolver.resolve(&cid(), n);
            let mut seen = std::collections::HashSet::new();
            for url in &urls {
                assert!(seen.insert(url.as_str().to_string()), "duplicate {url}");
            }
        }
    }
}
