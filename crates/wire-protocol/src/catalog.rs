//! Process-wide registry of supported application protocols.
//!
//! The catalog maps a [`ProtocolId`] to a [`ProtocolDescriptor`], the
//! capability handle a connection uses to pick codec and config machinery for
//! that protocol. Entries are registered once at startup and immutable
//! afterwards; channel builders validate their preference lists against the
//! catalog at configuration time, so the negotiation engine never has to.

use crate::alpn::ProtocolId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a protocol frames requests on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Framing {
    /// One request/response exchange at a time per connection.
    SingleStream,
    /// Many concurrent streams multiplexed over one connection.
    Multiplexed,
}

/// Capability handle tying a protocol token to its wire shape.
///
/// Carries no behavior of its own; codecs and per-protocol config live in the
/// layers that consume the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolDescriptor {
    id: ProtocolId,
    framing: Framing,
}

impl ProtocolDescriptor {
    pub fn new(id: ProtocolId, framing: Framing) -> Self {
        Self { id, framing }
    }

    pub fn id(&self) -> &ProtocolId {
        &self.id
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }
}

/// Immutable protocol registry, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct ProtocolCatalog {
    entries: HashMap<ProtocolId, ProtocolDescriptor>,
}

impl ProtocolCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// The catalog every deployment starts from: the multiplexed protocol
    /// (`h2`) and the single-stream protocol (`http/1.1`).
    pub fn standard() -> Self {
        Self::builder()
            .register(ProtocolDescriptor::new(
                ProtocolId::HTTP_2,
                Framing::Multiplexed,
            ))
            .register(ProtocolDescriptor::new(
                ProtocolId::HTTP_1_1,
                Framing::SingleStream,
            ))
            .build()
    }

    pub fn get(&self, id: &ProtocolId) -> Option<&ProtocolDescriptor> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &ProtocolId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builder for [`ProtocolCatalog`]. Keys are unique; registering the same
/// token twice keeps the latest descriptor.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    entries: HashMap<ProtocolId, ProtocolDescriptor>,
}

impl CatalogBuilder {
    pub fn register(mut self, descriptor: ProtocolDescriptor) -> Self {
        self.entries.insert(descriptor.id().clone(), descriptor);
        self
    }

    pub fn build(self) -> ProtocolCatalog {
        ProtocolCatalog {
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_registers_both_protocols() {
        let catalog = ProtocolCatalog::standard();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.get(&ProtocolId::HTTP_2).map(ProtocolDescriptor::framing),
            Some(Framing::Multiplexed)
        );
        assert_eq!(
            catalog
                .get(&ProtocolId::HTTP_1_1)
                .map(ProtocolDescriptor::framing),
            Some(Framing::SingleStream)
        );
    }

    #[test]
    fn unknown_tokens_are_absent() {
        let catalog = ProtocolCatalog::standard();
        assert!(!catalog.contains(&ProtocolId::new("spdy/3.1")));
        assert!(catalog.get(&ProtocolId::new("h3")).is_none());
    }

    #[test]
    fn re_registering_a_token_keeps_the_latest_descriptor() {
        let catalog = ProtocolCatalog::builder()
            .register(ProtocolDescriptor::new(
                ProtocolId::HTTP_2,
                Framing::SingleStream,
            ))
            .register(ProtocolDescriptor::new(
                ProtocolId::HTTP_2,
                Framing::Multiplexed,
            ))
            .build();
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.get(&ProtocolId::HTTP_2).map(ProtocolDescriptor::framing),
            Some(Framing::Multiplexed)
        );
    }
}
