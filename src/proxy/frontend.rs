//! Frontend composition: mux, endpoint registry, debug introspection.
//!
//! # Responsibilities
//! - Register handlers and endpoints before serving begins
//! - Maintain endpoint replica membership on behalf of the control channel
//! - Expose `/__backends` to operators inside the debug networks
//!
//! # Design Decisions
//! - Registration takes `&mut self`; the mux is frozen once the frontend is
//!   shared, so the serve path never locks it
//! - The endpoint list is shared with the debug handler through an `Arc`,
//!   avoiding a reference cycle through the mux

use std::fmt::Write as _;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use axum::body::Body;
use axum::http::{header, HeaderValue, Response};

use crate::net::allowlist::DebugNetworks;
use crate::proxy::endpoint::{Endpoint, Replica};
use crate::routing::mux::{not_found, ProxyRequest, RouteError, RouteHandler, ServeMux};
use crate::timing::Sleepish;

type EndpointList = Arc<RwLock<Vec<Arc<Endpoint>>>>;

/// The frontend: a pattern mux over registered handlers plus the endpoint
/// set that backend control connections join and leave.
pub struct Frontend {
    mux: ServeMux,
    debug_networks: DebugNetworks,
    endpoints: EndpointList,
    sleepish: Sleepish,
}

impl Frontend {
    pub fn new(debug_networks: DebugNetworks) -> Self {
        Self {
            mux: ServeMux::new(),
            debug_networks,
            endpoints: Arc::new(RwLock::new(Vec::new())),
            sleepish: Sleepish::new(),
        }
    }

    /// Replaces the ping-loop sleeper. Tests install an instant one.
    pub fn set_sleepish(&mut self, sleepish: Sleepish) {
        self.sleepish = sleepish;
    }

    pub(crate) fn sleepish(&self) -> &Sleepish {
        &self.sleepish
    }

    /// Registers a handler under a `<domain>/<path>` pattern.
    pub fn handle(&mut self, pattern: &str, handler: RouteHandler) -> Result<(), RouteError> {
        self.mux.handle(pattern, handler)
    }

    /// Registers an endpoint's forwarder at its root and adds it to the
    /// registry the control channel mutates.
    pub fn handle_endpoint(&mut self, endpoint: Endpoint) -> Result<Arc<Endpoint>, RouteError> {
        let endpoint = Arc::new(endpoint);
        self.mux
            .handle(&endpoint.root, RouteHandler::Forward(Arc::clone(&endpoint)))?;
        self.endpoints_write().push(Arc::clone(&endpoint));
        Ok(endpoint)
    }

    /// Registers `/__backends`, gated on the debug networks.
    pub fn handle_debug(&mut self) -> Result<(), RouteError> {
        let endpoints = Arc::clone(&self.endpoints);
        let networks = self.debug_networks.clone();
        self.mux.handle(
            "/__backends",
            RouteHandler::custom(move |req: ProxyRequest| {
                let endpoints = Arc::clone(&endpoints);
                let networks = networks.clone();
                async move { serve_debug(&networks, &endpoints, &req) }
            }),
        )
    }

    /// Serves one client request through the pattern mux.
    pub async fn serve(&self, req: ProxyRequest) -> Response<Body> {
        self.mux.serve(req).await
    }

    fn endpoints_read(&self) -> RwLockReadGuard<'_, Vec<Arc<Endpoint>>> {
        self.endpoints.read().unwrap_or_else(|e| e.into_inner())
    }

    fn endpoints_write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<Endpoint>>> {
        self.endpoints.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds a replica to the named endpoint. Unknown names are a
    /// registration error; the control connection reporting one closes.
    pub fn add_backend(&self, name: &str, replica: Arc<Replica>) -> Result<(), RouteError> {
        let endpoints = self.endpoints_read();
        match endpoints.iter().find(|e| e.name == name) {
            Some(endpoint) => {
                endpoint.add_replica(Arc::clone(&replica));
                tracing::info!(endpoint = %name, replica = %replica, "new backend");
                Ok(())
            }
            None => Err(RouteError::UnknownBackend(name.to_string())),
        }
    }

    /// Removes a replica by identity. Missing entries are logged, not
    /// errors: teardown must succeed no matter what state it finds.
    pub fn del_backend(&self, name: &str, replica: &Arc<Replica>) {
        let endpoints = self.endpoints_read();
        match endpoints.iter().find(|e| e.name == name) {
            Some(endpoint) => {
                if endpoint.remove_replica(replica) {
                    tracing::info!(endpoint = %name, replica = %replica, "closed backend");
                } else {
                    tracing::warn!(
                        endpoint = %name,
                        replica = %replica,
                        "could not find backend replica to close"
                    );
                }
            }
            None => {
                tracing::warn!(endpoint = %name, "could not find backend to close");
            }
        }
    }
}

fn serve_debug(
    networks: &DebugNetworks,
    endpoints: &EndpointList,
    req: &ProxyRequest,
) -> Response<Body> {
    let ip = req.peer.ip();
    let Some(network) = networks.containing(ip) else {
        tracing::warn!(peer = %req.peer, path = %req.path(), "blocked debug access");
        return not_found();
    };
    tracing::debug!(
        peer = %req.peer,
        network = %network,
        path = %req.path(),
        "allowed debug access"
    );

    let endpoints = endpoints.read().unwrap_or_else(|e| e.into_inner());
    let mut body = String::new();
    for endpoint in endpoints.iter() {
        let _ = writeln!(body, "Backend {:?} at {:?}:", endpoint.name, endpoint.root);
        for url in endpoint.replica_urls() {
            let _ = writeln!(body, " - {url}");
        }
    }

    let mut resp = Response::new(Body::from(body));
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::{Request, StatusCode};

    fn debug_req(ip: &str) -> ProxyRequest {
        ProxyRequest {
            request: Request::builder()
                .uri("/__backends")
                .body(Body::empty())
                .unwrap(),
            peer: format!(
                "{}:1224",
                if ip.contains(':') {
                    format!("[{ip}]")
                } else {
                    ip.to_string()
                }
            )
            .parse()
            .unwrap(),
            tls: false,
        }
    }

    fn test_frontend() -> Frontend {
        let mut fe = Frontend::new(DebugNetworks::local());
        fe.handle_endpoint(Endpoint::new("test", "/test")).unwrap();
        fe.handle_debug().unwrap();
        fe
    }

    #[tokio::test]
    async fn debug_allowed_from_local_networks() {
        let fe = test_frontend();
        for ip in ["127.0.0.1", "fe80::a:0:0:1:2"] {
            let resp = fe.serve(debug_req(ip)).await;
            assert_eq!(resp.status(), StatusCode::OK, "{ip}");
        }
    }

    #[tokio::test]
    async fn debug_blocked_from_public_addresses() {
        let fe = test_frontend();
        let resp = fe.serve(debug_req("188.14.109.23")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn debug_lists_endpoints_and_replicas() {
        let fe = test_frontend();
        let replica = Replica::new("10.0.0.5", 1337).unwrap();
        fe.add_backend("test", Arc::clone(&replica)).unwrap();

        let resp = fe.serve(debug_req("127.0.0.1")).await;
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("Backend \"test\" at \"/test\":"), "{text}");
        assert!(text.contains(" - http://10.0.0.5:1337/"), "{text}");
    }

    #[tokio::test]
    async fn backend_membership_lifecycle() {
        let fe = test_frontend();
        let endpoint = {
            let endpoints = fe.endpoints_read();
            Arc::clone(endpoints.iter().find(|e| e.name == "test").unwrap())
        };

        let replicas: Vec<_> = (0..3u16)
            .map(|i| Replica::new("10.0.0.5", 1337 + i).unwrap())
            .collect();
        for replica in &replicas {
            fe.add_backend("test", Arc::clone(replica)).unwrap();
        }
        assert_eq!(endpoint.replica_count(), 3);

        fe.del_backend("test", &replicas[1]);
        assert_eq!(endpoint.replica_count(), 2);
        // Removing again is a logged no-op.
        fe.del_backend("test", &replicas[1]);
        assert_eq!(endpoint.replica_count(), 2);

        fe.del_backend("test", &replicas[0]);
        fe.del_backend("test", &replicas[2]);
        assert_eq!(endpoint.replica_count(), 0);
    }

    #[tokio::test]
    async fn unknown_backend_name_is_an_error() {
        let fe = test_frontend();
        let replica = Replica::new("10.0.0.5", 1337).unwrap();
        let err = fe.add_backend("missing", replica).unwrap_err();
        assert_eq!(err.to_string(), "unknown backend \"missing\"");
    }
}
