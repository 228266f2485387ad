//! Request identification middleware.
//!
//! # Responsibilities
//! - Tag every request with an `x-request-id` as early as possible
//! - Leave client-supplied IDs alone so traces join up across hops
//!
//! # Design Decisions
//! - UUID v4; uniqueness matters, ordering does not
//! - The ID exists for frontend logs; the forwarder's header whitelist
//!   still decides whether backends ever see it

use std::task::{Context, Poll};

use axum::http::{HeaderName, HeaderValue, Request};
use tower::{Layer, Service};
use uuid::Uuid;

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Layer that wraps a service in [`RequestId`].
#[derive(Clone, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = RequestId<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestId { inner }
    }
}

/// Service that injects a fresh `x-request-id` when the request lacks one.
#[derive(Clone)]
pub struct RequestId<S> {
    inner: S,
}

impl<S, B> Service<Request<B>> for RequestId<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        if !req.headers().contains_key(&X_REQUEST_ID) {
            let id = Uuid::new_v4().to_string();
            if let Ok(value) = HeaderValue::from_str(&id) {
                req.headers_mut().insert(X_REQUEST_ID.clone(), value);
            }
        }
        self.inner.call(req)
    }
}
