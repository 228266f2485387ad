//! Request routing: the pattern trie and the composite mux.

pub mod mux;
pub mod path;
pub mod trie;

pub use mux::{ProxyRequest, RouteError, RouteHandler, ServeMux};
pub use trie::{Trie, TrieError};
