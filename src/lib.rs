//! gofr: a reverse-proxy frontend with self-registering backends.
//!
//! A single frontend terminates client HTTP/HTTPS and routes each request
//! through a composite domain-then-path trie. Backends are not configured
//! statically: they dial the frontend's control listener, say which
//! endpoint they serve, and stay in rotation exactly as long as their
//! connection keeps answering liveness pings.
//!
//! ```text
//!   client ──▶ http::HttpServer ──▶ routing::ServeMux ──▶ proxy::Endpoint ──▶ replica
//!                                                            ▲      │
//!                              control::server (register/ping)┘      └ random pick
//!                                       ▲
//!   backend ── control::backend ────────┘
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod proxy;
pub mod routing;

// Backend membership
pub mod control;

// Cross-cutting concerns
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod timing;

pub use config::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
