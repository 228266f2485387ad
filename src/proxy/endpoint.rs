//! Endpoint state and the request forwarder.
//!
//! # Responsibilities
//! - Hold one named service's routing policy and live replica set
//! - Turn a client request into a backend request (URL rewrite, header
//!   whitelist, body limit) and relay the response
//!
//! # Design Decisions
//! - Replica selection is uniform random; no retry, no fallback — a body may
//!   already be partially streamed, so a transparent retry is unsafe
//! - The chosen URI is copied out under the read lock, never referenced
//! - Replicas compare by identity: the same host:port registered twice is
//!   two entries, each removed by its own connection's teardown

use std::collections::HashSet;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::task::{Context, Poll};
use std::time::Instant;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, Response, StatusCode, Uri};
use http_body::Frame;
use http_body_util::BodyExt;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use rand::Rng;

use crate::proxy::headers::{classify, normalize_set, HeaderAction};
use crate::routing::mux::ProxyRequest;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
const X_GOFR_BACKEND: HeaderName = HeaderName::from_static("x-gofr-backend");
const X_GOFR_BACKEND_ROOT: HeaderName = HeaderName::from_static("x-gofr-backend-root");
const X_FRAME_OPTIONS: HeaderName = HeaderName::from_static("x-frame-options");
const X_XSS_PROTECTION: HeaderName = HeaderName::from_static("x-xss-protection");

/// One backend replica URL. Identity is the allocation: `add`/`remove` pair
/// up through `Arc::ptr_eq`, never structural equality.
#[derive(Debug)]
pub struct Replica {
    uri: Uri,
}

impl Replica {
    /// Builds `http://<host>:<port>`, bracketing IPv6 hosts.
    pub fn new(host: &str, port: u16) -> Result<Arc<Self>, http::uri::InvalidUri> {
        let authority = if host.contains(':') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        };
        let uri: Uri = format!("http://{authority}").parse()?;
        Ok(Arc::new(Self { uri }))
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }
}

impl fmt::Display for Replica {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}

/// The seam through which backend requests are performed. Swappable so tests
/// observe the synthesized request without a network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, BoxError>;
}

/// Default transport: a pooled hyper client.
pub struct HttpTransport {
    client: Client<HttpConnector, Body>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, BoxError> {
        let resp = self.client.request(req).await?;
        Ok(resp.map(Body::new))
    }
}

/// Body wrapper that ends the stream after `remaining` data bytes.
struct TruncateBody {
    inner: Body,
    remaining: u64,
}

impl http_body::Body for TruncateBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.remaining == 0 {
            return Poll::Ready(None);
        }
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => match frame.into_data() {
                Ok(data) => {
                    let take = (this.remaining).min(data.len() as u64) as usize;
                    this.remaining -= take as u64;
                    Poll::Ready(Some(Ok(Frame::data(data.slice(..take)))))
                }
                Err(other) => Poll::Ready(Some(Ok(other))),
            },
            other => other,
        }
    }
}

/// A named service: routing policy plus the mutable set of replica URLs the
/// control channel maintains.
pub struct Endpoint {
    pub name: String,
    pub root: String,
    allow_header: HashSet<String>,
    strip_header: HashSet<String>,
    body_size_limit: u64,
    transport: Arc<dyn Transport>,
    hosts: RwLock<Vec<Arc<Replica>>>,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            allow_header: HashSet::new(),
            strip_header: HashSet::new(),
            body_size_limit: 0,
            transport: Arc::new(HttpTransport::new()),
            hosts: RwLock::new(Vec::new()),
        }
    }

    /// Header names always copied through, overriding the unknown default.
    pub fn allow_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allow_header = normalize_set(names);
        self
    }

    /// Header names always removed, overriding the pass-through table.
    pub fn strip_headers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.strip_header = normalize_set(names);
        self
    }

    /// Request-body cap in bytes; zero means unlimited.
    pub fn body_size_limit(mut self, limit: u64) -> Self {
        self.body_size_limit = limit;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    fn hosts_read(&self) -> RwLockReadGuard<'_, Vec<Arc<Replica>>> {
        self.hosts.read().unwrap_or_else(|e| e.into_inner())
    }

    fn hosts_write(&self) -> RwLockWriteGuard<'_, Vec<Arc<Replica>>> {
        self.hosts.write().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn add_replica(&self, replica: Arc<Replica>) {
        self.hosts_write().push(replica);
    }

    /// Removes exactly the entry whose allocation matches. Returns whether
    /// anything was removed.
    pub(crate) fn remove_replica(&self, replica: &Arc<Replica>) -> bool {
        let mut hosts = self.hosts_write();
        match hosts.iter().position(|h| Arc::ptr_eq(h, replica)) {
            Some(idx) => {
                hosts.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn replica_count(&self) -> usize {
        self.hosts_read().len()
    }

    /// Display strings of the current replicas, for the debug listing.
    pub fn replica_urls(&self) -> Vec<String> {
        self.hosts_read().iter().map(|h| h.to_string()).collect()
    }

    /// Proxies one client request to a randomly chosen replica.
    pub async fn serve(&self, req: ProxyRequest) -> Response<Body> {
        let start = Instant::now();

        let target = {
            let hosts = self.hosts_read();
            if hosts.is_empty() {
                tracing::error!(endpoint = %self.name, "no backends available");
                return error_response(StatusCode::SERVICE_UNAVAILABLE, "Backend Unavailable");
            }
            let idx = rand::thread_rng().gen_range(0..hosts.len());
            hosts[idx].uri().clone()
        };

        let headers = self.backend_headers(&req);

        let original_uri = req.request.uri().clone();
        let mut parts = target.into_parts();
        let path_and_query = match req.query() {
            Some(q) => format!("{}?{}", req.path(), q),
            None => req.path().to_string(),
        };
        parts.path_and_query = match path_and_query.parse() {
            Ok(pq) => Some(pq),
            Err(_) => {
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Backend Error");
            }
        };
        let uri = match Uri::from_parts(parts) {
            Ok(uri) => uri,
            Err(_) => {
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Backend Error");
            }
        };

        let (client_parts, body) = req.request.into_parts();
        let body = if self.body_size_limit > 0 {
            Body::new(TruncateBody {
                inner: body,
                remaining: self.body_size_limit,
            })
        } else {
            body
        };

        let mut backend_req = match Request::builder()
            .method(client_parts.method.clone())
            .uri(uri)
            .body(body)
        {
            Ok(req) => req,
            Err(_) => {
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Backend Error");
            }
        };
        *backend_req.headers_mut() = headers;

        // Declared length survives, clamped to the limit.
        if let Some(declared) = content_length(&client_parts.headers) {
            let len = if self.body_size_limit > 0 {
                declared.min(self.body_size_limit)
            } else {
                declared
            };
            backend_req
                .headers_mut()
                .insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        }

        let backend_uri = backend_req.uri().clone();
        let resp = match self.transport.round_trip(backend_req).await {
            Ok(resp) => resp,
            Err(err) => {
                tracing::debug!(
                    endpoint = %self.name,
                    from = %original_uri,
                    to = %backend_uri,
                    error = %err,
                    "backend error"
                );
                return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Backend Error");
            }
        };

        let (resp_parts, resp_body) = resp.into_parts();
        let endpoint_name = self.name.clone();
        let resp_body = Body::new(resp_body.map_err(move |err| {
            tracing::debug!(endpoint = %endpoint_name, error = %err, "error relaying response body");
            err
        }));

        let mut out = Response::new(resp_body);
        *out.status_mut() = resp_parts.status;
        *out.headers_mut() = resp_parts.headers;
        out.headers_mut()
            .insert(X_FRAME_OPTIONS, HeaderValue::from_static("sameorigin"));
        out.headers_mut()
            .insert(X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));

        tracing::debug!(
            endpoint = %self.name,
            from = %original_uri,
            to = %backend_uri,
            elapsed = ?start.elapsed(),
            "routed request"
        );
        out
    }

    /// Base headers plus the classified client headers.
    fn backend_headers(&self, req: &ProxyRequest) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(host) = HeaderValue::from_str(req.host()) {
            headers.insert(header::HOST, host);
        }
        if let Ok(ip) = HeaderValue::from_str(&req.peer.ip().to_string()) {
            headers.insert(X_FORWARDED_FOR, ip);
        }
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static(req.scheme()));
        if let Ok(name) = HeaderValue::from_str(&self.name) {
            headers.insert(X_GOFR_BACKEND, name);
        }
        if let Ok(root) = HeaderValue::from_str(&self.root) {
            headers.insert(X_GOFR_BACKEND_ROOT, root);
        }

        for (name, value) in req.request.headers() {
            match classify(name.as_str(), &self.allow_header, &self.strip_header) {
                HeaderAction::Pass => {
                    headers.append(name.clone(), value.clone());
                }
                HeaderAction::Drop => {}
                HeaderAction::DropUnknown => {
                    tracing::warn!(
                        endpoint = %self.name,
                        header = %name,
                        "blocking header"
                    );
                }
            }
        }
        headers
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("replicas", &self.replica_count())
            .finish()
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

fn error_response(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut resp = Response::new(Body::from(message));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    resp
}
