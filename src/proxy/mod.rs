//! Endpoint registry and request forwarding.

pub mod endpoint;
pub mod frontend;
pub mod headers;

pub use endpoint::{Endpoint, Replica, Transport};
pub use frontend::Frontend;
