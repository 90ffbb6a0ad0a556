//! Channel configuration: a mutable builder and the immutable snapshot a
//! connection is actually built with.
//!
//! The builder is read exactly once, at `build_*` time. The snapshot copies
//! everything it needs, so mutating the builder afterwards is never
//! observable through an already-issued snapshot, and one snapshot can be
//! shared read-only by every connection spawned from it.

use crate::error::{ChannelError, Result};
use crate::flush::{default_flush_strategy, FlushStrategy};
use crate::tls::{
    build_client_tls, build_server_tls, ClientTlsSettings, ServerTlsSettings, TlsContext,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use weft_wire_protocol::{PreferenceList, ProtocolCatalog, ProtocolId};

/// Socket-option keys. One value per key; setting a key again replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketOption {
    NoDelay,
    KeepAlive,
    ReuseAddress,
    SendBufferSize,
    ReceiveBufferSize,
    LingerSecs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketOptionValue {
    Flag(bool),
    Size(u32),
    Secs(u32),
}

/// Verbosity of wire-level logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireLogLevel {
    Trace,
    Debug,
    Info,
}

impl WireLogLevel {
    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            WireLogLevel::Trace => tracing::Level::TRACE,
            WireLogLevel::Debug => tracing::Level::DEBUG,
            WireLogLevel::Info => tracing::Level::INFO,
        }
    }
}

/// Wire-logging configuration. Absent entirely when wire logging is off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireLogConfig {
    /// `tracing` target the wire events are emitted under.
    pub target: String,
    pub level: WireLogLevel,
    /// Whether payload bytes may appear in the log, or headers only.
    pub log_user_data: bool,
}

/// Immutable transport settings shared by both connection roles.
///
/// Constructed only via [`ChannelConfigBuilder`]; every accessor is a pure
/// read and no mutation path exists after construction.
#[derive(Debug, Clone)]
pub struct ReadOnlyChannelConfig {
    options: HashMap<SocketOption, SocketOptionValue>,
    idle_timeout: Option<Duration>,
    flush_strategy: Arc<dyn FlushStrategy>,
    wire_log: Option<WireLogConfig>,
    preferences: PreferenceList,
    catalog: Arc<ProtocolCatalog>,
}

impl ReadOnlyChannelConfig {
    /// Socket options for channels built from this config. The map was copied
    /// out of the builder at build time and is never aliased to it.
    pub fn options(&self) -> &HashMap<SocketOption, SocketOptionValue> {
        &self.options
    }

    pub fn option(&self, key: SocketOption) -> Option<SocketOptionValue> {
        self.options.get(&key).copied()
    }

    /// `None` means the idle timeout is disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }

    /// Shared handle; the strategy instance is common to every connection
    /// built from this config.
    pub fn flush_strategy(&self) -> Arc<dyn FlushStrategy> {
        Arc::clone(&self.flush_strategy)
    }

    pub fn wire_log(&self) -> Option<&WireLogConfig> {
        self.wire_log.as_ref()
    }

    /// Ordered protocol preferences, as declared on the builder.
    pub fn preferences(&self) -> &PreferenceList {
        &self.preferences
    }

    pub fn catalog(&self) -> &Arc<ProtocolCatalog> {
        &self.catalog
    }
}

/// Capability surface a connection role exposes: the shared transport
/// settings plus the role-specific TLS context.
pub trait SecureConfig: Send + Sync {
    fn transport(&self) -> &ReadOnlyChannelConfig;
    fn tls_context(&self) -> TlsContext;
}

/// Client-side snapshot: CA-trust-backed TLS with optional peer-hostname
/// verification override.
#[derive(Debug, Clone)]
pub struct ReadOnlyClientConfig {
    transport: ReadOnlyChannelConfig,
    tls: Arc<rustls::ClientConfig>,
    peer_hostname: Option<String>,
}

impl ReadOnlyClientConfig {
    /// Hostname the peer certificate is verified against, when overridden.
    pub fn peer_hostname(&self) -> Option<&str> {
        self.peer_hostname.as_deref()
    }
}

impl SecureConfig for ReadOnlyClientConfig {
    fn transport(&self) -> &ReadOnlyChannelConfig {
        &self.transport
    }

    fn tls_context(&self) -> TlsContext {
        TlsContext::Client(Arc::clone(&self.tls))
    }
}

/// Server-side snapshot: certificate-and-key-backed TLS.
#[derive(Debug, Clone)]
pub struct ReadOnlyServerConfig {
    transport: ReadOnlyChannelConfig,
    tls: Arc<rustls::ServerConfig>,
}

impl SecureConfig for ReadOnlyServerConfig {
    fn transport(&self) -> &ReadOnlyChannelConfig {
        &self.transport
    }

    fn tls_context(&self) -> TlsContext {
        TlsContext::Server(Arc::clone(&self.tls))
    }
}

/// Mutable configuration source. `build_client` / `build_server` read it once
/// and emit an immutable snapshot; the builder stays usable afterwards.
#[derive(Debug)]
pub struct ChannelConfigBuilder {
    catalog: Arc<ProtocolCatalog>,
    options: HashMap<SocketOption, SocketOptionValue>,
    idle_timeout: Duration,
    flush_strategy: Arc<dyn FlushStrategy>,
    wire_log: Option<WireLogConfig>,
    preferences: Vec<ProtocolId>,
}

impl ChannelConfigBuilder {
    pub fn new(catalog: Arc<ProtocolCatalog>) -> Self {
        Self {
            catalog,
            options: HashMap::new(),
            idle_timeout: Duration::ZERO,
            flush_strategy: default_flush_strategy(),
            wire_log: None,
            preferences: Vec::new(),
        }
    }

    pub fn socket_option(&mut self, key: SocketOption, value: SocketOptionValue) -> &mut Self {
        self.options.insert(key, value);
        self
    }

    /// `Duration::ZERO` disables the idle timeout.
    pub fn idle_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn flush_strategy(&mut self, strategy: Arc<dyn FlushStrategy>) -> &mut Self {
        self.flush_strategy = strategy;
        self
    }

    pub fn wire_log(&mut self, config: WireLogConfig) -> &mut Self {
        self.wire_log = Some(config);
        self
    }

    /// Declares the supported protocols; declaration order defines preference
    /// order. Replaces any previously declared list.
    pub fn protocols(&mut self, ids: impl IntoIterator<Item = ProtocolId>) -> &mut Self {
        self.preferences = ids.into_iter().collect();
        self
    }

    pub fn build_client(&self, tls: ClientTlsSettings) -> Result<ReadOnlyClientConfig> {
        let transport = self.snapshot_transport()?;
        let tls_config = build_client_tls(&tls, transport.preferences())?;
        Ok(ReadOnlyClientConfig {
            transport,
            tls: tls_config,
            peer_hostname: tls.peer_hostname,
        })
    }

    pub fn build_server(&self, tls: ServerTlsSettings) -> Result<ReadOnlyServerConfig> {
        let transport = self.snapshot_transport()?;
        let tls_config = build_server_tls(&tls, transport.preferences())?;
        Ok(ReadOnlyServerConfig {
            transport,
            tls: tls_config,
        })
    }

    fn snapshot_transport(&self) -> Result<ReadOnlyChannelConfig> {
        if self.preferences.is_empty() {
            return Err(ChannelError::InvalidConfiguration(
                "protocol preference list is empty".into(),
            ));
        }
        for id in &self.preferences {
            if !self.catalog.contains(id) {
                return Err(ChannelError::InvalidConfiguration(format!(
                    "protocol {id} is not registered in the catalog"
                )));
            }
        }

        let idle_timeout = if self.idle_timeout.is_zero() {
            None
        } else {
            Some(self.idle_timeout)
        };

        Ok(ReadOnlyChannelConfig {
            options: self.options.clone(),
            idle_timeout,
            flush_strategy: Arc::clone(&self.flush_strategy),
            wire_log: self.wire_log.clone(),
            preferences: PreferenceList::new(self.preferences.iter().cloned()),
            catalog: Arc::clone(&self.catalog),
        })
    }
}
