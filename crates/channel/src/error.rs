use std::fmt;
use weft_wire_protocol::PreferenceList;

/// Why a channel stopped accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// ALPN negotiation found no common protocol.
    NoProtocolOverlap,
    /// The security handshake failed before a protocol was negotiated.
    HandshakeFailure,
    /// The channel idled past its configured timeout.
    IdleTimeout,
    /// The underlying transport reported an error.
    TransportError,
    /// The local side closed the channel explicitly.
    LocallyClosed,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CloseReason::NoProtocolOverlap => "no common application protocol",
            CloseReason::HandshakeFailure => "security handshake failed",
            CloseReason::IdleTimeout => "idle timeout expired",
            CloseReason::TransportError => "transport error",
            CloseReason::LocallyClosed => "closed locally",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Server and client preference sets share no token. Connection-fatal;
    /// this core never retries. Any fallback policy belongs to the
    /// connection-management layer above.
    ///
    /// `server` is `None` on the client side, where only the absence of a
    /// selection is observable, never the server's preference list.
    #[error("no ALPN overlap between server preferences {} and client offer {client:?}", fmt_server_side(.server))]
    NoOverlap {
        server: Option<PreferenceList>,
        client: PreferenceList,
    },

    /// Malformed configuration supplied at build time. Fails fast, never
    /// reaches negotiation.
    #[error("invalid channel configuration: {0}")]
    InvalidConfiguration(String),

    /// The channel was closed; every subsequent operation fails with this
    /// kind, whether or not a request was already in flight.
    #[error("channel closed: {0}")]
    ClosedChannel(CloseReason),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
}

pub type Result<T> = std::result::Result<T, ChannelError>;

fn fmt_server_side(server: &Option<PreferenceList>) -> String {
    match server {
        Some(prefs) => format!("{prefs:?}"),
        None => "(not visible on this side)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_wire_protocol::{PreferenceList, ProtocolId};

    #[test]
    fn no_overlap_names_both_lists() {
        let err = ChannelError::NoOverlap {
            server: Some(PreferenceList::new([ProtocolId::HTTP_2])),
            client: PreferenceList::new([ProtocolId::HTTP_1_1]),
        };
        let text = err.to_string();
        assert!(text.contains("h2"), "{text}");
        assert!(text.contains("http/1.1"), "{text}");
    }

    #[test]
    fn client_side_no_overlap_does_not_claim_a_server_list() {
        let err = ChannelError::NoOverlap {
            server: None,
            client: PreferenceList::new([ProtocolId::HTTP_2]),
        };
        let text = err.to_string();
        assert!(text.contains("not visible on this side"), "{text}");
        assert!(text.contains("h2"), "{text}");
    }

    #[test]
    fn closed_channel_carries_the_reason() {
        let err = ChannelError::ClosedChannel(CloseReason::NoProtocolOverlap);
        assert!(err.to_string().contains("no common application protocol"));
    }
}
