//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the frontend from configuration
//! - Create the Axum router and wire up middleware
//! - Dispatch every request into the pattern mux
//! - Serve with graceful shutdown
//!
//! # Design Decisions
//! - One catch-all route: the pattern mux, not Axum, decides routing
//! - The TLS flag rides in the state; the listener surface is otherwise
//!   invisible to request handling

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, Response},
    routing::any,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::http::request::RequestIdLayer;
use crate::lifecycle::Shutdown;
use crate::net::allowlist::{DebugNetworks, NetworkParseError};
use crate::proxy::endpoint::Endpoint;
use crate::proxy::frontend::Frontend;
use crate::routing::mux::{ProxyRequest, RouteError};

/// Errors building the server out of a config.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Network(#[from] NetworkParseError),
}

/// Application state injected into the proxy handler.
#[derive(Clone)]
struct AppState {
    frontend: Arc<Frontend>,
    tls: bool,
}

/// The client-facing HTTP server.
pub struct HttpServer {
    router: Router,
    frontend: Arc<Frontend>,
}

impl HttpServer {
    /// Builds the frontend and router from configuration.
    pub fn new(config: &ProxyConfig) -> Result<Self, ServerError> {
        let networks = if config.debug.networks.is_empty() {
            DebugNetworks::local()
        } else {
            DebugNetworks::parse(&config.debug.networks)?
        };

        let mut frontend = Frontend::new(networks);
        for endpoint_config in &config.endpoints {
            let endpoint = Endpoint::new(&endpoint_config.name, &endpoint_config.root)
                .allow_headers(&endpoint_config.allow_headers)
                .strip_headers(&endpoint_config.strip_headers)
                .body_size_limit(endpoint_config.body_size_limit);
            frontend.handle_endpoint(endpoint)?;
        }
        if config.debug.enabled {
            frontend.handle_debug()?;
        }

        Ok(Self::with_frontend(frontend, config))
    }

    /// Wraps an already-registered frontend. Used by tests that register
    /// handlers directly.
    pub fn with_frontend(frontend: Frontend, config: &ProxyConfig) -> Self {
        let frontend = Arc::new(frontend);
        let state = AppState {
            frontend: Arc::clone(&frontend),
            tls: config.listener.tls.is_some(),
        };
        let router = Self::build_router(config, state);
        Self { router, frontend }
    }

    /// The shared frontend, for wiring up the control listener.
    pub fn frontend(&self) -> Arc<Frontend> {
        Arc::clone(&self.frontend)
    }

    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.request_timeout_secs,
            )))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    /// Runs the server on the given listener until shutdown fires, then
    /// drains in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let mut stop = shutdown.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Hands the request, with its connection facts, to the pattern mux.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response<Body> {
    state
        .frontend
        .serve(ProxyRequest {
            request,
            peer,
            tls: state.tls,
        })
        .await
}
