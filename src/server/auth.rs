//! Bearer authentication for the `/v1` API

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::config::ApiConfig;

/// API auth with the bearer token already expanded
#[derive(Debug, Default)]
pub struct ResolvedAuth {
    /// `None` leaves the API open
    bearer_token: Option<String>,
}

impl ResolvedAuth {
    /// Expand `env:` references and generate `auto` tokens.
    #[must_use]
    pub fn from_config(config: &ApiConfig) -> Self {
        Self {
            bearer_token: config.resolve_bearer_token().filter(|t| !t.is_empty()),
        }
    }

    /// Whether callers must authenticate.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.bearer_token.is_some()
    }

    /// The resolved token, for the startup banner when it was generated.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    /// Constant-time comparison against the configured token.
    fn accepts(&self, presented: &str) -> bool {
        self.bearer_token
            .as_deref()
            .is_some_and(|expected| bool::from(expected.as_bytes().ct_eq(presented.as_bytes())))
    }
}

/// Authentication middleware
pub async fn auth_middleware(
    State(auth): State<Arc<ResolvedAuth>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !auth.enabled() {
        return next.run(request).await;
    }

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
        });

    let Some(token) = token else {
        warn!(path = %request.uri().path(), "Missing Authorization header");
        return unauthorized_response("Missing Authorization header. Use: Authorization: Bearer <token>");
    };

    if !auth.accepts(token) {
        warn!(path = %request.uri().path(), "Invalid bearer token");
        return unauthorized_response("Invalid bearer token");
    }

    debug!(path = %request.uri().path(), "Authenticated");
    next.run(request).await
}

/// Create a 401 Unauthorized response
fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(json!({
            "error": "unauthorized",
            "message": message,
        })),
    )
        .into_response()
}
