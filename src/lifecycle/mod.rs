//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Startup:  load config → validate → build frontend → bind → serve
//! Shutdown: signal received → control connections close (replicas drain
//!           out via their teardown path) → HTTP server drains → exit
//! ```
//!
//! # Design Decisions
//! - One broadcast channel fans the shutdown signal out to every listener,
//!   control connection, and backend loop
//! - In-flight HTTP requests run to completion; only accepting stops

pub mod shutdown;

pub use shutdown::Shutdown;
