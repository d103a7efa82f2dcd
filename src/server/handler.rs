//! HTTP handlers for the secrets API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` `POST` `DELETE` | `/v1/config/admin` | Admin credential |
//! | `POST` | `/v1/config/rotate` | Rotate the admin credential |
//! | `GET` `POST` | `/v1/config/user_token` | User-token defaults |
//! | `GET` | `/v1/roles` | List roles |
//! | `GET` `POST` `DELETE` | `/v1/roles/{name}` | Role templates |
//! | `GET` | `/v1/token/{role}` | Issue a role token (`?ttl=`) |
//! | `POST` | `/v1/user_token/{username}` | Issue a user token |
//! | `POST` | `/v1/leases/revoke` | Revoke an issued token |
//! | `POST` | `/v1/leases/renew` | Renew a lease |
//! | `GET` | `/health` | Liveness, unauthenticated |
//!
//! Errors are returned as `{"error": "<code>", "message": "<text>"}`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::error;

use super::auth::{ResolvedAuth, auth_middleware};
use crate::backend::{
    AdminConfigUpdate, Backend, LeaseInternal, RotateRequest, UserTokenDefaultsUpdate,
    UserTokenRequest,
};
use crate::records::RoleTemplate;
use crate::{Error, Result, ttl};

/// Shared application state
pub struct AppState {
    /// The secrets backend
    pub backend: Backend,
}

/// Router-level limits taken from the server config
#[derive(Debug, Clone, Copy)]
pub struct RouterLimits {
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

/// Create the router
pub fn create_router(state: Arc<AppState>, auth: Arc<ResolvedAuth>, limits: RouterLimits) -> Router {
    let api = Router::new()
        .route(
            "/config/admin",
            get(read_admin).post(write_admin).delete(delete_admin),
        )
        .route("/config/rotate", post(rotate))
        .route(
            "/config/user_token",
            get(read_user_token_config).post(write_user_token_config),
        )
        .route("/roles", get(list_roles))
        .route(
            "/roles/{name}",
            get(read_role).post(write_role).delete(delete_role),
        )
        .route("/token/{role}", get(issue_role_token))
        .route("/user_token/{username}", post(issue_user_token))
        .route("/leases/revoke", post(revoke_lease))
        .route("/leases/renew", post(renew_lease))
        .layer(middleware::from_fn_with_state(auth, auth_middleware));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api)
        .layer(DefaultBodyLimit::max(limits.max_body_size))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            limits.request_timeout,
        ))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self, code = self.code(), "Request failed");
        }
        (
            status,
            Json(json!({
                "error": self.code(),
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

/// Parse a JSON request body. An empty body yields the type's default.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| Error::InvalidRequest(format!("invalid body: {e}")))
}

/// GET /health
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── config/admin ───────────────────────────────────────────────────────────

async fn read_admin(State(state): State<Arc<AppState>>) -> Result<Response> {
    Ok(Json(state.backend.read_admin().await?).into_response())
}

async fn write_admin(State(state): State<Arc<AppState>>, body: Bytes) -> Result<StatusCode> {
    let update: AdminConfigUpdate = parse_body(&body)?;
    state.backend.write_admin(update).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_admin(State(state): State<Arc<AppState>>) -> Result<StatusCode> {
    state.backend.delete_admin().await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── config/rotate ──────────────────────────────────────────────────────────

async fn rotate(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response> {
    let request: RotateRequest = parse_body(&body)?;
    let outcome = state.backend.rotate(request).await?;

    let warnings = outcome.warnings();
    if warnings.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(json!({
        "token_id": outcome.token_id,
        "previous_token_id": outcome.previous_token_id,
        "warnings": warnings,
    }))
    .into_response())
}

// ── config/user_token ──────────────────────────────────────────────────────

async fn read_user_token_config(State(state): State<Arc<AppState>>) -> Result<Response> {
    Ok(Json(state.backend.read_user_token_config().await?).into_response())
}

async fn write_user_token_config(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<StatusCode> {
    let update: UserTokenDefaultsUpdate = parse_body(&body)?;
    state.backend.write_user_token_config(update).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── roles ──────────────────────────────────────────────────────────────────

async fn list_roles(State(state): State<Arc<AppState>>) -> Result<Response> {
    let keys = state.backend.list_roles().await?;
    Ok(Json(json!({ "keys": keys })).into_response())
}

async fn read_role(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response> {
    Ok(Json(state.backend.get_role(&name).await?).into_response())
}

async fn write_role(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<StatusCode> {
    let template: RoleTemplate = parse_body(&body)?;
    state.backend.put_role(&name, template).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_role(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<StatusCode> {
    state.backend.delete_role(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── token issuance ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TtlQuery {
    ttl: Option<String>,
}

async fn issue_role_token(
    State(state): State<Arc<AppState>>,
    Path(role): Path<String>,
    Query(query): Query<TtlQuery>,
) -> Result<Response> {
    let requested = query.ttl.as_deref().map(ttl::parse).transpose()?;
    Ok(Json(state.backend.issue_role_token(&role, requested).await?).into_response())
}

async fn issue_user_token(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    body: Bytes,
) -> Result<Response> {
    let request: UserTokenRequest = parse_body(&body)?;
    Ok(Json(state.backend.issue_user_token(&username, request).await?).into_response())
}

// ── leases ─────────────────────────────────────────────────────────────────

async fn revoke_lease(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response> {
    let lease: LeaseInternal = parse_body(&body)?;
    let outcome = state.backend.revoke_lease(&lease).await?;
    Ok(Json(json!({ "outcome": outcome })).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct RenewRequest {
    #[serde(default)]
    internal: LeaseInternal,
    #[serde(default, deserialize_with = "ttl::deserialize_opt")]
    increment: Option<u64>,
}

async fn renew_lease(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response> {
    let request: RenewRequest = parse_body(&body)?;
    let renewal = state
        .backend
        .renew_lease(&request.internal, request.increment)
        .await?;
    Ok(Json(renewal).into_response())
}
