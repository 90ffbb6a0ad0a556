//! # Weft Wire Protocol
//!
//! Protocol identity and negotiation primitives for the Weft secure transport.
//! This crate decides *which* application protocol a connection speaks; it
//! deliberately contains no I/O, no TLS machinery, and no codecs.
//!
//! ## Key Pieces
//!
//! - [`ProtocolId`] / [`PreferenceList`]: byte-exact ALPN tokens and ordered
//!   preference lists, with the wire format a TLS stack consumes.
//! - [`negotiate`]: the pure ALPN selection function. Server preference order
//!   is dispositive; the client's offer is a set.
//! - [`ProtocolCatalog`]: process-wide, startup-built registry mapping tokens
//!   to [`ProtocolDescriptor`] capability handles.
//!
//! ## Quick Start
//!
//! ```rust
//! use weft_wire_protocol::{negotiate, NegotiationResult, PreferenceList, ProtocolId};
//!
//! let server = PreferenceList::new([ProtocolId::HTTP_2, ProtocolId::HTTP_1_1]);
//! let client = PreferenceList::new([ProtocolId::HTTP_1_1]);
//!
//! assert_eq!(
//!     negotiate(&server, &client),
//!     NegotiationResult::Selected(ProtocolId::HTTP_1_1),
//! );
//! ```

pub mod alpn;
pub mod catalog;

pub use alpn::{negotiate, NegotiationResult, PreferenceList, ProtocolId};
pub use catalog::{CatalogBuilder, Framing, ProtocolCatalog, ProtocolDescriptor};
