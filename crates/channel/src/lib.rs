//! Secure channel configuration and per-connection protocol binding.
//!
//! This crate owns everything between "TCP connection accepted" and
//! "application protocol ready": immutable transport snapshots built once
//! from a [`ChannelConfigBuilder`], role-specific TLS contexts carrying the
//! configured ALPN preference lists, and a [`SecureChannel`] that gates
//! request dispatch on the deferred negotiation outcome.
//!
//! Protocol identity and the negotiation algorithm itself live in
//! [`weft_wire_protocol`]; this crate consumes them.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use weft_channel::{ChannelConfigBuilder, ServerTlsSettings};
//! use weft_wire_protocol::{ProtocolCatalog, ProtocolId};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut builder = ChannelConfigBuilder::new(Arc::new(ProtocolCatalog::standard()));
//! builder.protocols([ProtocolId::HTTP_2, ProtocolId::HTTP_1_1]);
//! let server = builder.build_server(ServerTlsSettings {
//!     cert_chain_pem: std::fs::read("server.pem")?,
//!     private_key_pem: std::fs::read("server.key")?,
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod binding;
pub mod config;
pub mod connection;
pub mod error;
pub mod flush;
pub mod tls;

pub use binding::{BindingState, DeferredProtocolBinding};
pub use config::{
    ChannelConfigBuilder, ReadOnlyChannelConfig, ReadOnlyClientConfig, ReadOnlyServerConfig,
    SecureConfig, SocketOption, SocketOptionValue, WireLogConfig, WireLogLevel,
};
pub use connection::{ProvisionalFactory, Request, SecureChannel, WireFrame};
pub use error::{ChannelError, CloseReason, Result};
pub use flush::{default_flush_strategy, BatchFlush, FlushOnEach, FlushStrategy};
pub use tls::{ClientTlsSettings, ServerTlsSettings, TlsContext};
