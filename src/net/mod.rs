//! Network-level helpers.

pub mod allowlist;

pub use allowlist::DebugNetworks;
