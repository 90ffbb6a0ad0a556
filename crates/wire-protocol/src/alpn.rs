//! ALPN protocol tokens, preference lists, and the negotiation engine.
//!
//! The negotiation model mirrors standard ALPN semantics: the client
//! *advertises* a set of protocol tokens during the TLS handshake, the server
//! *selects* one according to its own preference order. The server's order is
//! dispositive; the client's order carries no weight, only membership does.
//!
//! ## Negotiation Flow
//!
//! ```text
//! Client → Server: ClientHello + ALPN extension
//! ┌──────────────────────────────────────────────┐
//! │ ALPN protocol list (offered, order ignored): │
//! │ - "h2"                                       │
//! │ - "http/1.1"                                 │
//! └──────────────────────────────────────────────┘
//! Server: scan own preference list in order, pick the
//!         first token the client also offered.
//! ```
//!
//! Tokens are compared byte-exact, never case-folded. Tokens outside the
//! [`ProtocolCatalog`](crate::catalog::ProtocolCatalog) are treated as opaque
//! and still compared byte-exact; catalog membership is a *configuration-time*
//! concern, not a negotiation-time one.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;

/// An exact-match ALPN protocol token.
///
/// Equality is byte-exact. The two canonical tokens this transport registers
/// are [`ProtocolId::HTTP_2`] (`h2`, multiplexed) and [`ProtocolId::HTTP_1_1`]
/// (`http/1.1`, single-stream), carried on the wire exactly as spelled here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolId(Cow<'static, str>);

impl ProtocolId {
    /// The multiplexed protocol token.
    pub const HTTP_2: ProtocolId = ProtocolId(Cow::Borrowed("h2"));

    /// The single-stream protocol token.
    pub const HTTP_1_1: ProtocolId = ProtocolId(Cow::Borrowed("http/1.1"));

    /// Creates a token from an arbitrary string. Unknown tokens received from
    /// a peer stay representable and compare byte-exact like any other.
    pub fn new(token: impl Into<String>) -> Self {
        ProtocolId(Cow::Owned(token.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The exact bytes carried in the ALPN wire extension.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered list of protocol tokens, most-preferred first.
///
/// Duplicates are permitted but redundant. Builders enforce non-emptiness
/// before a list ever reaches [`negotiate`]; the engine itself accepts any
/// list and treats an empty one as "nothing offered".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreferenceList(Vec<ProtocolId>);

impl PreferenceList {
    pub fn new(ids: impl IntoIterator<Item = ProtocolId>) -> Self {
        PreferenceList(ids.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The highest-preference token, if any.
    pub fn first(&self) -> Option<&ProtocolId> {
        self.0.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProtocolId> {
        self.0.iter()
    }

    pub fn contains(&self, id: &ProtocolId) -> bool {
        self.0.contains(id)
    }

    /// Wire format handed to a TLS stack, e.g. the `alpn_protocols` field on
    /// `rustls` client and server configs.
    pub fn alpn_wire_format(&self) -> Vec<Vec<u8>> {
        self.0.iter().map(|id| id.as_bytes().to_vec()).collect()
    }
}

impl FromIterator<ProtocolId> for PreferenceList {
    fn from_iter<T: IntoIterator<Item = ProtocolId>>(iter: T) -> Self {
        PreferenceList(iter.into_iter().collect())
    }
}

impl From<Vec<ProtocolId>> for PreferenceList {
    fn from(ids: Vec<ProtocolId>) -> Self {
        PreferenceList(ids)
    }
}

/// Outcome of one ALPN negotiation. Produced exactly once per connection and
/// never retracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationResult {
    /// Both peers will speak this protocol.
    Selected(ProtocolId),
    /// The preference sets share no token. Connection-fatal; the transport
    /// layer closes the connection, no retry happens here.
    NoOverlap,
}

impl NegotiationResult {
    pub fn selected(&self) -> Option<&ProtocolId> {
        match self {
            NegotiationResult::Selected(id) => Some(id),
            NegotiationResult::NoOverlap => None,
        }
    }

    pub fn is_no_overlap(&self) -> bool {
        matches!(self, NegotiationResult::NoOverlap)
    }
}

/// Selects the negotiated protocol from both sides' preference lists.
///
/// Scans `server_preferences` in order and returns the first token that also
/// appears anywhere in `client_offered`, which is treated as a set: permuting
/// the client list never changes the outcome.
///
/// An empty `client_offered` list (a legacy peer advertising no protocols) is
/// an immediate [`NegotiationResult::NoOverlap`]; there is no implicit
/// fallback protocol. An empty server list likewise yields `NoOverlap`,
/// though config builders reject that case long before negotiation.
///
/// Pure and stateless: safe to call concurrently for unrelated connections.
pub fn negotiate(
    server_preferences: &PreferenceList,
    client_offered: &PreferenceList,
) -> NegotiationResult {
    if client_offered.is_empty() {
        tracing::debug!(
            target: "weft::wire::alpn",
            "client offered no ALPN protocols, negotiation yields no overlap"
        );
        return NegotiationResult::NoOverlap;
    }

    let offered: HashSet<&[u8]> = client_offered.iter().map(ProtocolId::as_bytes).collect();
    for candidate in server_preferences.iter() {
        if offered.contains(candidate.as_bytes()) {
            tracing::debug!(
                target: "weft::wire::alpn",
                protocol = %candidate,
                "negotiated application protocol"
            );
            return NegotiationResult::Selected(candidate.clone());
        }
    }

    tracing::debug!(
        target: "weft::wire::alpn",
        server = ?server_preferences,
        client = ?client_offered,
        "no common ALPN protocol"
    );
    NegotiationResult::NoOverlap
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(ids: &[&ProtocolId]) -> PreferenceList {
        PreferenceList::new(ids.iter().map(|id| (*id).clone()))
    }

    #[test]
    fn server_order_is_dispositive() {
        let h2 = &ProtocolId::HTTP_2;
        let h1 = &ProtocolId::HTTP_1_1;

        // (server, client, expected)
        let cases: &[(&[&ProtocolId], &[&ProtocolId], NegotiationResult)] = &[
            (&[h2, h1], &[h2, h1], NegotiationResult::Selected(h2.clone())),
            (&[h2, h1], &[h1, h2], NegotiationResult::Selected(h2.clone())),
            (&[h2, h1], &[h2], NegotiationResult::Selected(h2.clone())),
            (&[h2, h1], &[h1], NegotiationResult::Selected(h1.clone())),
            (&[h1, h2], &[h2, h1], NegotiationResult::Selected(h1.clone())),
            (&[h1, h2], &[h1, h2], NegotiationResult::Selected(h1.clone())),
            (&[h1, h2], &[h2], NegotiationResult::Selected(h2.clone())),
            (&[h1, h2], &[h1], NegotiationResult::Selected(h1.clone())),
            (&[h2], &[h2, h1], NegotiationResult::Selected(h2.clone())),
            (&[h2], &[h1, h2], NegotiationResult::Selected(h2.clone())),
            (&[h2], &[h2], NegotiationResult::Selected(h2.clone())),
            (&[h2], &[h1], NegotiationResult::NoOverlap),
            (&[h1], &[h2, h1], NegotiationResult::Selected(h1.clone())),
            (&[h1], &[h1, h2], NegotiationResult::Selected(h1.clone())),
            (&[h1], &[h2], NegotiationResult::NoOverlap),
            (&[h1], &[h1], NegotiationResult::Selected(h1.clone())),
        ];

        for (server, client, expected) in cases {
            let got = negotiate(&list(server), &list(client));
            assert_eq!(
                &got, expected,
                "server={server:?} client={client:?} expected {expected:?}, got {got:?}"
            );
        }
    }

    #[test]
    fn client_order_never_changes_the_result() {
        let h2 = ProtocolId::HTTP_2;
        let h1 = ProtocolId::HTTP_1_1;
        let other = ProtocolId::new("spdy/3.1");

        let server = PreferenceList::new([h2.clone(), h1.clone()]);
        let permutations: [[&ProtocolId; 3]; 6] = [
            [&h2, &h1, &other],
            [&h2, &other, &h1],
            [&h1, &h2, &other],
            [&h1, &other, &h2],
            [&other, &h2, &h1],
            [&other, &h1, &h2],
        ];
        for perm in permutations {
            let client = PreferenceList::new(perm.iter().map(|id| (*id).clone()));
            assert_eq!(
                negotiate(&server, &client),
                NegotiationResult::Selected(h2.clone())
            );
        }
    }

    #[test]
    fn empty_client_offer_is_no_overlap() {
        let server = PreferenceList::new([ProtocolId::HTTP_2, ProtocolId::HTTP_1_1]);
        let client = PreferenceList::new([]);
        assert_eq!(negotiate(&server, &client), NegotiationResult::NoOverlap);
    }

    #[test]
    fn empty_server_list_is_no_overlap() {
        let server = PreferenceList::new([]);
        let client = PreferenceList::new([ProtocolId::HTTP_2]);
        assert_eq!(negotiate(&server, &client), NegotiationResult::NoOverlap);
    }

    #[test]
    fn disjoint_lists_are_deterministic() {
        let server = PreferenceList::new([ProtocolId::new("a"), ProtocolId::new("b")]);
        let client = PreferenceList::new([ProtocolId::new("c"), ProtocolId::new("d")]);
        for _ in 0..3 {
            assert_eq!(negotiate(&server, &client), NegotiationResult::NoOverlap);
        }
    }

    #[test]
    fn repeated_calls_with_same_inputs_agree() {
        let server = PreferenceList::new([ProtocolId::HTTP_2, ProtocolId::HTTP_1_1]);
        let client = PreferenceList::new([ProtocolId::HTTP_1_1]);
        let first = negotiate(&server, &client);
        let second = negotiate(&server, &client);
        assert_eq!(first, second);
        assert_eq!(first, NegotiationResult::Selected(ProtocolId::HTTP_1_1));
    }

    #[test]
    fn tokens_are_never_case_folded() {
        let server = PreferenceList::new([ProtocolId::new("H2")]);
        let client = PreferenceList::new([ProtocolId::HTTP_2]);
        assert_eq!(negotiate(&server, &client), NegotiationResult::NoOverlap);
    }

    #[test]
    fn unknown_tokens_are_compared_opaquely() {
        let custom = ProtocolId::new("my-proto/7");
        let server = PreferenceList::new([ProtocolId::HTTP_2, custom.clone()]);
        let client = PreferenceList::new([custom.clone()]);
        assert_eq!(
            negotiate(&server, &client),
            NegotiationResult::Selected(custom)
        );
    }

    #[test]
    fn duplicates_in_lists_are_redundant() {
        let server = PreferenceList::new([
            ProtocolId::HTTP_1_1,
            ProtocolId::HTTP_1_1,
            ProtocolId::HTTP_2,
        ]);
        let client = PreferenceList::new([ProtocolId::HTTP_2, ProtocolId::HTTP_2]);
        assert_eq!(
            negotiate(&server, &client),
            NegotiationResult::Selected(ProtocolId::HTTP_2)
        );
    }

    #[test]
    fn wire_format_preserves_order_and_bytes() {
        let prefs = PreferenceList::new([ProtocolId::HTTP_2, ProtocolId::HTTP_1_1]);
        assert_eq!(
            prefs.alpn_wire_format(),
            vec![b"h2".to_vec(), b"http/1.1".to_vec()]
        );
    }
}
