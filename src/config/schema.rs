//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML config
//! files; every section has usable defaults.

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy frontend.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Client-facing listener.
    pub listener: ListenerConfig,

    /// Backend control listener.
    pub control: ControlConfig,

    /// Endpoint definitions: named services backends may join.
    pub endpoints: Vec<EndpointConfig>,

    /// Debug-handler access control.
    pub debug: DebugConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Client-facing listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g. "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS termination, handled by an external acceptor. Its
    /// presence marks requests as https for X-Forwarded-Proto.
    pub tls: Option<TlsConfig>,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            request_timeout_secs: 30,
        }
    }
}

/// TLS material locations for the external acceptor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
}

/// Control-channel listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Bind address backends dial (e.g. "0.0.0.0:8090").
    pub bind_address: String,

    /// Base interval between liveness pings, jittered per ping.
    pub ping_delay_secs: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8090".to_string(),
            ping_delay_secs: 30,
        }
    }
}

/// One named service backends can register for.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Unique endpoint name; backends register with it.
    pub name: String,

    /// Routing pattern, `<domain>/<path>` with the domain optional.
    pub root: String,

    /// Header names always forwarded, overriding the built-in tables.
    #[serde(default)]
    pub allow_headers: Vec<String>,

    /// Header names always removed, overriding the built-in tables.
    #[serde(default)]
    pub strip_headers: Vec<String>,

    /// Request-body cap in bytes; 0 means unlimited.
    #[serde(default)]
    pub body_size_limit: u64,
}

/// Debug-handler access control.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Register the debug handlers at all.
    pub enabled: bool,

    /// CIDR networks allowed to reach the debug handlers. Empty means the
    /// built-in loopback + link-local + private set.
    pub networks: Vec<String>,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            networks: Vec::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter when RUST_LOG is unset.
    pub log_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "gofr=info,tower_http=info".to_string(),
        }
    }
}
