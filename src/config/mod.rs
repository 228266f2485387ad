//! Configuration: schema, loading, validation.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ControlConfig, DebugConfig, EndpointConfig, ListenerConfig, ObservabilityConfig, ProxyConfig,
    TlsConfig,
};
