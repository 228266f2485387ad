//! Composite domain-then-path request mux.
//!
//! # Responsibilities
//! - Register handlers under `<domain>/<path>` patterns
//! - Canonicalize sub-domains (302) and messy paths (301)
//! - Dispatch each request to the deepest matching handler
//!
//! # Design Decisions
//! - Outer trie keyed by reversed domain segments, tld outermost
//! - Inner tries keyed by path segments with their trailing slash attached
//! - Every Domain root carries the 404 handler, so dispatch always lands
//! - The whole structure is frozen once serving starts; reads take no locks

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use thiserror::Error;

use crate::proxy::endpoint::Endpoint;
use crate::routing::path;
use crate::routing::trie::{Trie, TrieError};

/// Registration-time routing error. Fatal for the caller at setup.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("pattern {0:?} is not in <domain>/<path> form")]
    MalformedPattern(String),
    #[error(transparent)]
    Insert(#[from] TrieError),
    #[error("unknown backend {0:?}")]
    UnknownBackend(String),
}

/// A client request paired with the connection facts handlers need:
/// the peer address and whether it arrived over TLS.
pub struct ProxyRequest {
    pub request: Request<Body>,
    pub peer: SocketAddr,
    pub tls: bool,
}

impl ProxyRequest {
    /// Host the client asked for: the `Host` header, falling back to the
    /// request URI's authority.
    pub fn host(&self) -> &str {
        self.request
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| self.request.uri().authority().map(|a| a.as_str()))
            .unwrap_or("")
    }

    /// Host with any port stripped and folded to lowercase, the form the
    /// domain trie is keyed by.
    pub fn canonical_host(&self) -> String {
        let host = self.host();
        let bare = if let Some(rest) = host.strip_prefix('[') {
            rest.split(']').next().unwrap_or(rest)
        } else {
            host.split(':').next().unwrap_or(host)
        };
        bare.to_ascii_lowercase()
    }

    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    pub fn query(&self) -> Option<&str> {
        self.request.uri().query()
    }

    /// Scheme implied by the listening surface.
    pub fn scheme(&self) -> &'static str {
        if self.tls {
            "https"
        } else {
            "http"
        }
    }
}

type BoxFuture = Pin<Box<dyn Future<Output = Response<Body>> + Send + 'static>>;

/// The handler bound at a trie leaf.
///
/// A tagged variant rather than a trait object keeps dispatch transparent;
/// the `Custom` arm carries a type-erased async closure for handlers that
/// live outside the core (debug listing, static collaborators, tests).
#[derive(Clone)]
pub enum RouteHandler {
    /// Forward to one of an endpoint's replicas.
    Forward(Arc<Endpoint>),
    /// 302 to the same path with a trailing slash.
    AddSlash,
    /// Terminal 404.
    NotFound,
    /// Type-erased async handler.
    Custom(Arc<dyn Fn(ProxyRequest) -> BoxFuture + Send + Sync>),
}

impl RouteHandler {
    /// Wraps an async closure as a handler.
    pub fn custom<F, Fut>(f: F) -> Self
    where
        F: Fn(ProxyRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response<Body>> + Send + 'static,
    {
        RouteHandler::Custom(Arc::new(move |req| Box::pin(f(req))))
    }

    pub async fn call(&self, req: ProxyRequest) -> Response<Body> {
        match self {
            RouteHandler::Forward(endpoint) => endpoint.serve(req).await,
            RouteHandler::AddSlash => {
                let location = match req.query() {
                    Some(q) => format!("{}/?{}", req.path(), q),
                    None => format!("{}/", req.path()),
                };
                redirect(StatusCode::FOUND, &location)
            }
            RouteHandler::NotFound => not_found(),
            RouteHandler::Custom(f) => f(req).await,
        }
    }
}

impl std::fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteHandler::Forward(e) => write!(f, "Forward({:?})", e.name),
            RouteHandler::AddSlash => write!(f, "AddSlash"),
            RouteHandler::NotFound => write!(f, "NotFound"),
            RouteHandler::Custom(_) => write!(f, "Custom"),
        }
    }
}

/// Builds a 3xx response with the given Location.
pub fn redirect(status: StatusCode, location: &str) -> Response<Body> {
    let mut resp = Response::new(Body::empty());
    *resp.status_mut() = status;
    if let Ok(value) = location.parse() {
        resp.headers_mut().insert(header::LOCATION, value);
    }
    resp
}

pub(crate) fn not_found() -> Response<Body> {
    let mut resp = Response::new(Body::from("not found"));
    *resp.status_mut() = StatusCode::NOT_FOUND;
    resp
}

/// The path trie for one domain. Its root leaf is always `NotFound`, so a
/// lookup can always dispatch something.
#[derive(Debug)]
pub struct Domain {
    trie: Trie<RouteHandler>,
}

impl Domain {
    pub fn new() -> Self {
        Self {
            trie: Trie::with_leaf(RouteHandler::NotFound),
        }
    }

    fn insert(
        &mut self,
        segments: &[String],
        trailing: bool,
        handler: RouteHandler,
    ) -> Result<(), TrieError> {
        self.trie.insert(segments, handler)?;
        if trailing && !segments.is_empty() {
            // Register the slash-trimmed twin as a redirect so `/dir` finds
            // `/dir/`; an explicit handler already there wins.
            let mut twin = segments.to_vec();
            if let Some(last) = twin.last_mut() {
                if let Some(stripped) = last.strip_suffix('/') {
                    *last = stripped.to_string();
                }
            }
            let _ = self.trie.insert(&twin, RouteHandler::AddSlash);
        }
        Ok(())
    }

    /// Serves a request whose domain resolution already landed here.
    pub async fn serve(&self, req: ProxyRequest) -> Response<Body> {
        let original = req.path().to_string();
        let cleaned = path::clean(&original);
        if cleaned != original {
            let location = match req.query() {
                Some(q) => format!("{cleaned}?{q}"),
                None => cleaned,
            };
            return redirect(StatusCode::MOVED_PERMANENTLY, &location);
        }

        let segments = path::request_segments(&original);
        let refs: Vec<&str> = segments.iter().map(String::as_str).collect();
        let (n, found) = self.trie.find(&refs);

        // A partial match is only valid under a directory segment.
        if n != refs.len() && !found.name().ends_with('/') {
            return not_found();
        }

        match found.leaf() {
            Some(handler) => handler.call(req).await,
            None => not_found(),
        }
    }
}

impl Default for Domain {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes requests across domains: an outer suffix trie of [`Domain`]s whose
/// root leaf is the any-host default Domain.
#[derive(Debug)]
pub struct ServeMux {
    domains: Trie<Domain>,
}

impl ServeMux {
    pub fn new() -> Self {
        Self {
            domains: Trie::with_leaf(Domain::new()),
        }
    }

    /// Registers `handler` under a `<domain>/<path>` pattern. The domain may
    /// be empty (any host); the path must begin with `/`. A trailing slash
    /// additionally registers the slash-adding redirect at the bare path.
    pub fn handle(&mut self, pattern: &str, handler: RouteHandler) -> Result<(), RouteError> {
        let mut pieces = path::split_after(pattern);
        if pieces.len() < 2 {
            return Err(RouteError::MalformedPattern(pattern.to_string()));
        }

        let domain_piece = pieces.remove(0);
        let domain_piece = domain_piece.strip_suffix('/').unwrap_or(&domain_piece);
        let mut domain: Vec<String> = path::trim_empty_ends(
            domain_piece.split('.').map(str::to_string).collect(),
        );
        domain.reverse();

        let path_segments = path::trim_empty_ends(pieces);
        let trailing = pattern.ends_with('/');

        let domain_refs: Vec<&str> = domain.iter().map(String::as_str).collect();
        match self.domains.get_mut(&domain_refs) {
            Some(existing) => existing.insert(&path_segments, trailing, handler)?,
            None => {
                let mut fresh = Domain::new();
                fresh.insert(&path_segments, trailing, handler)?;
                self.domains.insert(&domain, fresh)?;
            }
        }
        Ok(())
    }

    /// Serves a request: domain canonicalization first, then the matched
    /// domain's path dispatch.
    pub async fn serve(&self, req: ProxyRequest) -> Response<Body> {
        let host = req.canonical_host();
        let mut domain: Vec<&str> = host.split('.').collect();
        domain.reverse();

        let (n, found) = self.domains.find(&domain);
        if n > 0 && n != domain.len() {
            // Matched a registered suffix of the host: redirect to it.
            let mut matched = domain[..n].to_vec();
            matched.reverse();
            let canonical = matched.join(".");
            let location = match req.query() {
                Some(q) => format!("{}://{}{}?{}", req.scheme(), canonical, req.path(), q),
                None => format!("{}://{}{}", req.scheme(), canonical, req.path()),
            };
            return redirect(StatusCode::FOUND, &location);
        }

        match found.leaf() {
            Some(domain) => domain.serve(req).await,
            // Unreachable: the mux root always carries the default Domain.
            None => not_found(),
        }
    }
}

impl Default for ServeMux {
    fn default() -> Self {
        Self::new()
    }
}
