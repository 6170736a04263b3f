//! Authentication layer for protected routes.
//!
//! `AuthLayer` wraps any HTTP service with the gate. On `Authorized` it
//! inserts an [`AuthContext`] into the request extensions and calls the inner
//! service, returning its response unchanged. On any denial it answers
//! directly with the error response and the inner service is never called.

use crate::auth::{AuthContext, AuthDecision, AuthGate, AuthorizationPolicy};
use axum::http::{header, Request};
use axum::response::{IntoResponse, Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer enforcing one authorization policy.
#[derive(Clone)]
pub struct AuthLayer {
    gate: Arc<AuthGate>,
    policy: Arc<AuthorizationPolicy>,
}

impl AuthLayer {
    pub fn new(gate: Arc<AuthGate>, policy: AuthorizationPolicy) -> Self {
        Self {
            gate,
            policy: Arc::new(policy),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            gate: Arc::clone(&self.gate),
            policy: Arc::clone(&self.policy),
        }
    }
}

/// Tower service produced by [`AuthLayer`].
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    gate: Arc<AuthGate>,
    policy: Arc<AuthorizationPolicy>,
}

impl<S, B> Service<Request<B>> for AuthService<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        // Take the service that was driven to readiness, leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let gate = Arc::clone(&self.gate);
        let policy = Arc::clone(&self.policy);

        Box::pin(async move {
            let authorization = req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);

            match gate.authorize(authorization.as_deref(), &policy).await {
                AuthDecision::Authorized(context) => {
                    tracing::debug!(target: "gk.middleware.auth", "Request authorized");
                    req.extensions_mut().insert(context);
                    inner.call(req).await
                }
                AuthDecision::Unauthenticated(err) | AuthDecision::Forbidden(err) => {
                    Ok(err.into_response())
                }
            }
        })
    }
}

/// Extension trait for reading the gate's result from a request.
pub trait AuthContextExt {
    /// Returns `None` if no auth layer ran for this request.
    fn auth_context(&self) -> Option<&AuthContext>;
}

impl<B> AuthContextExt for Request<B> {
    fn auth_context(&self) -> Option<&AuthContext> {
        self.extensions().get::<AuthContext>()
    }
}
