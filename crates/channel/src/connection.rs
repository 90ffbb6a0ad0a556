//! Per-connection surface: ties one config snapshot to one deferred protocol
//! binding, gates request dispatch on resolution, and owns the close path.
//!
//! The provisional-factory flow covers the window between "secure channel
//! established" and "ALPN result known": a consumer may shape a request
//! optimistically after the highest-preference configured protocol, and
//! [`SecureChannel::dispatch`] corrects the wire-level framing before any
//! bytes go out if that guess turns out wrong. The same request object and
//! channel handle are reused either way, and keep-alive is untouched by the
//! correction.

use crate::binding::DeferredProtocolBinding;
use crate::config::{ReadOnlyChannelConfig, SecureConfig};
use crate::error::{ChannelError, CloseReason, Result};
use crate::tls::TlsContext;
use std::sync::Arc;
use std::sync::OnceLock;
use weft_wire_protocol::{
    negotiate, Framing, NegotiationResult, PreferenceList, ProtocolDescriptor, ProtocolId,
};

/// Application-level request shape produced by a protocol factory.
///
/// The payload is opaque to this layer; only the wire-level framing marker is
/// ever adjusted, and only before dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    framing: Framing,
    keep_alive: bool,
    payload: Vec<u8>,
}

impl Request {
    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn reframe(&mut self, framing: Framing) {
        self.framing = framing;
    }
}

/// Builds requests before the ALPN outcome is known, shaped optimistically by
/// the highest-preference configured protocol.
#[derive(Debug, Clone)]
pub struct ProvisionalFactory {
    descriptor: ProtocolDescriptor,
}

impl ProvisionalFactory {
    /// The descriptor the optimistic guess is based on.
    pub fn descriptor(&self) -> &ProtocolDescriptor {
        &self.descriptor
    }

    pub fn request(&self, payload: Vec<u8>) -> Request {
        Request {
            framing: self.descriptor.framing(),
            keep_alive: true,
            payload,
        }
    }
}

/// A wire-ready frame. Tagged with the connection's single resolved protocol;
/// a frame referencing any other protocol can never be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    pub protocol: ProtocolId,
    pub framing: Framing,
    pub payload: Vec<u8>,
}

/// One secure connection's view of negotiation state and configuration.
pub struct SecureChannel {
    config: Arc<dyn SecureConfig>,
    binding: DeferredProtocolBinding,
    closed: OnceLock<CloseReason>,
}

impl SecureChannel {
    pub fn new(config: Arc<dyn SecureConfig>) -> Self {
        Self {
            config,
            binding: DeferredProtocolBinding::new(),
            closed: OnceLock::new(),
        }
    }

    pub fn transport(&self) -> &ReadOnlyChannelConfig {
        self.config.transport()
    }

    /// Role-specific TLS context from the snapshot this channel was built
    /// with; handed to the external handshake machinery.
    pub fn tls_context(&self) -> TlsContext {
        self.config.tls_context()
    }

    /// The resolved protocol, or `None` while negotiation is still pending
    /// or the channel failed before resolution.
    pub fn negotiated(&self) -> Option<ProtocolId> {
        match self.binding.try_result() {
            Some(Ok(NegotiationResult::Selected(id))) => Some(id),
            _ => None,
        }
    }

    pub fn binding(&self) -> &DeferredProtocolBinding {
        &self.binding
    }

    fn close_reason(&self) -> Option<CloseReason> {
        self.closed.get().copied()
    }

    fn mark_closed(&self, reason: CloseReason) {
        // First reason wins; later closes keep the original cause.
        let _ = self.closed.set(reason);
    }

    fn ensure_open(&self) -> Result<()> {
        match self.close_reason() {
            Some(reason) => Err(ChannelError::ClosedChannel(reason)),
            None => Ok(()),
        }
    }

    /// Server-side handshake completion: negotiates against the peer's
    /// offered list and publishes the outcome. On no overlap the channel is
    /// closed and the typed failure propagates to the caller.
    ///
    /// A handshake completing after the channel was already closed (idle
    /// timeout, transport error) is an ordinary late arrival and fails with
    /// the closed-channel kind; the binding stays `Failed`.
    pub fn resolve_from_offer(&self, peer_offered: &PreferenceList) -> Result<ProtocolId> {
        self.ensure_open()?;
        let server = self.transport().preferences().clone();
        match negotiate(&server, peer_offered) {
            NegotiationResult::Selected(id) => {
                self.binding.resolve(NegotiationResult::Selected(id.clone()));
                Ok(id)
            }
            NegotiationResult::NoOverlap => {
                self.binding.resolve(NegotiationResult::NoOverlap);
                self.mark_closed(CloseReason::NoProtocolOverlap);
                Err(ChannelError::NoOverlap {
                    server: Some(server),
                    client: peer_offered.clone(),
                })
            }
        }
    }

    /// Client-side handshake completion: publishes the token the server
    /// selected on the wire, or no-overlap when the server selected nothing.
    /// Like [`resolve_from_offer`](Self::resolve_from_offer), a selection
    /// arriving on an already-closed channel fails with the closed-channel
    /// kind instead of resolving.
    pub fn resolve_wire_selection(&self, selected: Option<&[u8]>) -> Result<ProtocolId> {
        self.ensure_open()?;
        match selected {
            Some(token) => match std::str::from_utf8(token) {
                Ok(token) => {
                    let id = ProtocolId::new(token);
                    self.binding.resolve(NegotiationResult::Selected(id.clone()));
                    Ok(id)
                }
                Err(_) => {
                    // A token we cannot even represent is a broken handshake,
                    // not a negotiation outcome.
                    self.mark_closed(CloseReason::HandshakeFailure);
                    self.binding.fail_if_pending(CloseReason::HandshakeFailure);
                    Err(ChannelError::ClosedChannel(CloseReason::HandshakeFailure))
                }
            },
            None => {
                self.binding.resolve(NegotiationResult::NoOverlap);
                self.mark_closed(CloseReason::NoProtocolOverlap);
                // The client never sees the server's preference list, only
                // the absence of a selection.
                Err(ChannelError::NoOverlap {
                    server: None,
                    client: self.transport().preferences().clone(),
                })
            }
        }
    }

    /// Closes the channel. Unconditionally fails a still-pending binding so
    /// no waiter hangs; subsequent operations fail with the closed-channel
    /// error kind.
    pub fn close(&self, reason: CloseReason) {
        self.mark_closed(reason);
        self.binding.fail_if_pending(reason);
        tracing::debug!(target: "weft::channel::connection", %reason, "channel closed");
    }

    /// Request factory usable before resolution, shaped by the
    /// highest-preference configured protocol.
    pub fn provisional_factory(&self) -> Result<ProvisionalFactory> {
        self.ensure_open()?;
        let transport = self.transport();
        let first = transport.preferences().first().ok_or_else(|| {
            ChannelError::InvalidConfiguration("protocol preference list is empty".into())
        })?;
        let descriptor = transport.catalog().get(first).cloned().ok_or_else(|| {
            ChannelError::InvalidConfiguration(format!(
                "protocol {first} is not registered in the catalog"
            ))
        })?;
        Ok(ProvisionalFactory { descriptor })
    }

    /// Gates a request on negotiation: suspends until the outcome is known,
    /// corrects an optimistic framing guess, and returns the wire-ready
    /// frame. No frame referencing a non-resolved protocol ever leaves here,
    /// and no request is dispatched before resolution completes.
    pub async fn dispatch(&self, request: &mut Request) -> Result<WireFrame> {
        let result = self.binding.await_result().await?;
        match result {
            NegotiationResult::Selected(id) => {
                self.ensure_open()?;
                let descriptor = self.transport().catalog().get(&id).cloned().ok_or_else(|| {
                    ChannelError::InvalidConfiguration(format!(
                        "negotiated protocol {id} is not registered in the catalog"
                    ))
                })?;
                if request.framing() != descriptor.framing() {
                    tracing::debug!(
                        target: "weft::channel::connection",
                        negotiated = %id,
                        "correcting optimistic request framing before dispatch"
                    );
                    request.reframe(descriptor.framing());
                }
                Ok(WireFrame {
                    protocol: id,
                    framing: request.framing(),
                    payload: request.payload().to_vec(),
                })
            }
            NegotiationResult::NoOverlap => {
                self.mark_closed(CloseReason::NoProtocolOverlap);
                Err(ChannelError::ClosedChannel(CloseReason::NoProtocolOverlap))
            }
        }
    }
}
