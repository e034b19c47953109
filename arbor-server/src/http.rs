//! Arbor HTTP REST API
//!
//! Axum server exposing fragments, branches, auto-linking, the memory tree and
//! visualization over HTTP. Runs alongside the Unix socket IPC server on port
//! 8767 (configurable).
//!
//! Each endpoint is a thin axum handler that builds an IPC request and hands it
//! to the shared router through [`dispatch_inner`], so both transports share one
//! code path. The caller is identified by the `x-owner-id` header.
//!
//! Endpoints:
//! - GET    /health                  : storage health
//! - GET    /version                 : server version info
//! - POST   /fragments               : create a fragment
//! - GET    /fragments               : list fragments (query filters)
//! - GET    /fragments/:id           : fetch one fragment
//! - PATCH  /fragments/:id           : update a fragment
//! - DELETE /fragments/:id           : delete a fragment and its connections
//! - POST   /branches                : create a connection
//! - GET    /branches                : list connections (query filters)
//! - GET    /branches/:id            : fetch one connection
//! - PATCH  /branches/:id            : update a connection
//! - DELETE /branches/:id            : delete a connection
//! - POST   /branches/auto-link      : discover and persist connections
//! - GET    /branches/tree           : memory tree
//! - POST   /branches/visualization  : visualization graph

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use arbor_core::ipc::{ArborRequest, ArborResponse};
use arbor_core::models::{
    AutoLinkRequest, BranchFilter, BranchPatch, BranchType, CreateBranch, FragmentFilters,
    FragmentPatch, FragmentType, NewFragment, VisualizationRequest,
};
use arbor_core::{ArborConfig, ArborError, GraphStore};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

pub const OWNER_HEADER: &str = "x-owner-id";

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub store: Arc<dyn GraphStore>,
    pub config: ArborConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route(
            "/fragments",
            post(create_fragment_handler).get(list_fragments_handler),
        )
        .route(
            "/fragments/:id",
            get(get_fragment_handler)
                .patch(update_fragment_handler)
                .delete(delete_fragment_handler),
        )
        .route(
            "/branches",
            post(create_branch_handler).get(list_branches_handler),
        )
        .route("/branches/auto-link", post(auto_link_handler))
        .route("/branches/tree", get(memory_tree_handler))
        .route("/branches/visualization", post(visualization_handler))
        .route(
            "/branches/:id",
            get(get_branch_handler)
                .patch(update_branch_handler)
                .delete(delete_branch_handler),
        )
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    store: Arc<dyn GraphStore>,
    config: ArborConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState { store, config });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Arbor HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

/// Query string for `GET /fragments`. List values are comma-separated.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FragmentQuery {
    #[serde(rename = "type")]
    pub fragment_type: Option<String>,
    pub search: Option<String>,
    pub tags: Option<String>,
    pub mood: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl FragmentQuery {
    pub fn into_filters(self) -> Result<FragmentFilters, ArborError> {
        Ok(FragmentFilters {
            fragment_types: parse_list::<FragmentType>(self.fragment_type.as_deref())?,
            search: self.search.filter(|s| !s.trim().is_empty()),
            tags: split_list(self.tags.as_deref()),
            mood: self.mood,
            created_after: self.created_after,
            created_before: self.created_before,
            limit: self.limit,
        })
    }
}

/// Query string for `GET /branches`. `type` is comma-separated.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BranchQuery {
    pub source_id: Option<String>,
    pub target_id: Option<String>,
    pub fragment_id: Option<String>,
    #[serde(rename = "type")]
    pub branch_type: Option<String>,
    pub min_weight: Option<f64>,
    pub max_weight: Option<f64>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl BranchQuery {
    pub fn into_filter(self) -> Result<BranchFilter, ArborError> {
        Ok(BranchFilter {
            involving_owner: String::new(),
            source_id: self.source_id,
            target_id: self.target_id,
            fragment_id: self.fragment_id,
            types: parse_list::<BranchType>(self.branch_type.as_deref())?,
            min_weight: self.min_weight,
            max_weight: self.max_weight,
            created_after: self.created_after,
            created_before: self.created_before,
            limit: self.limit,
        })
    }
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn parse_list<T>(raw: Option<&str>) -> Result<Vec<T>, ArborError>
where
    T: FromStr<Err = ArborError>,
{
    split_list(raw).iter().map(|s| s.parse()).collect()
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }

    fn body(msg: impl Into<String>) -> serde_json::Value {
        serde_json::to_value(Self::new(msg)).unwrap_or_else(|_| serde_json::json!({}))
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check: probes storage and returns (status_code, json_body).
pub async fn health_inner(store: &dyn GraphStore, socket_path: &str) -> (StatusCode, serde_json::Value) {
    match store.health().await {
        Ok(backend) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "storage": store.name(),
                "backend": backend,
                "socket": socket_path,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "storage": store.name(),
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version: returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "arbor/1",
    })
}

/// Caller identity from the `x-owner-id` header.
pub fn owner_from(headers: &HeaderMap) -> Result<String, (StatusCode, serde_json::Value)> {
    headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                ErrorResponse::body(format!("{} header is required", OWNER_HEADER)),
            )
        })
}

/// HTTP status for an IPC error code.
pub fn status_for_code(code: Option<&str>) -> StatusCode {
    match code {
        Some("not_found") => StatusCode::NOT_FOUND,
        Some("invalid_input") => StatusCode::BAD_REQUEST,
        Some("conflict") => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Run `request` through the IPC router and translate the response.
pub async fn dispatch_inner(
    state: &HttpState,
    request: ArborRequest,
    success: StatusCode,
) -> (StatusCode, serde_json::Value) {
    let response =
        crate::router::handle_request(request, state.store.as_ref(), &state.config).await;

    match response_to_http(response) {
        Ok(data) => (success, data),
        Err((status, msg)) => (status, ErrorResponse::body(msg)),
    }
}

/// Resolve the owner, build the request, dispatch.
async fn owned<F>(
    state: &HttpState,
    headers: &HeaderMap,
    success: StatusCode,
    build: F,
) -> (StatusCode, Json<serde_json::Value>)
where
    F: FnOnce(String) -> Result<ArborRequest, ArborError>,
{
    let owner = match owner_from(headers) {
        Ok(owner) => owner,
        Err((status, body)) => return (status, Json(body)),
    };
    let (status, body) = match build(owner) {
        Ok(request) => dispatch_inner(state, request, success).await,
        Err(e) => (status_for_code(Some(e.code())), ErrorResponse::body(e.to_string())),
    };
    (status, Json(body))
}

// ============================================================================
// Axum handler wrappers (thin: delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) =
        health_inner(state.store.as_ref(), &state.config.service.socket_path).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn create_fragment_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Json(fragment): Json<NewFragment>,
) -> impl IntoResponse {
    owned(&state, &headers, StatusCode::CREATED, |owner| {
        Ok(ArborRequest::CreateFragment { owner, fragment })
    })
    .await
}

pub async fn list_fragments_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Query(query): Query<FragmentQuery>,
) -> impl IntoResponse {
    owned(&state, &headers, StatusCode::OK, |owner| {
        Ok(ArborRequest::ListFragments {
            owner,
            filters: query.into_filters()?,
        })
    })
    .await
}

pub async fn get_fragment_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    owned(&state, &headers, StatusCode::OK, |owner| {
        Ok(ArborRequest::GetFragment { owner, id })
    })
    .await
}

pub async fn update_fragment_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<FragmentPatch>,
) -> impl IntoResponse {
    owned(&state, &headers, StatusCode::OK, |owner| {
        Ok(ArborRequest::UpdateFragment { owner, id, patch })
    })
    .await
}

pub async fn delete_fragment_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    owned(&state, &headers, StatusCode::OK, |owner| {
        Ok(ArborRequest::DeleteFragment { owner, id })
    })
    .await
}

pub async fn create_branch_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Json(branch): Json<CreateBranch>,
) -> impl IntoResponse {
    owned(&state, &headers, StatusCode::CREATED, |owner| {
        Ok(ArborRequest::CreateBranch { owner, branch })
    })
    .await
}

pub async fn list_branches_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Query(query): Query<BranchQuery>,
) -> impl IntoResponse {
    owned(&state, &headers, StatusCode::OK, |owner| {
        Ok(ArborRequest::ListBranches {
            owner,
            filter: query.into_filter()?,
        })
    })
    .await
}

pub async fn get_branch_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    owned(&state, &headers, StatusCode::OK, |owner| {
        Ok(ArborRequest::GetBranch { owner, id })
    })
    .await
}

pub async fn update_branch_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<BranchPatch>,
) -> impl IntoResponse {
    owned(&state, &headers, StatusCode::OK, |owner| {
        Ok(ArborRequest::UpdateBranch { owner, id, patch })
    })
    .await
}

pub async fn delete_branch_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> impl IntoResponse {
    owned(&state, &headers, StatusCode::OK, |owner| {
        Ok(ArborRequest::DeleteBranch { owner, id })
    })
    .await
}

pub async fn auto_link_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Json(options): Json<AutoLinkRequest>,
) -> impl IntoResponse {
    owned(&state, &headers, StatusCode::OK, |owner| {
        Ok(ArborRequest::AutoLink { owner, options })
    })
    .await
}

pub async fn memory_tree_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    owned(&state, &headers, StatusCode::OK, |owner| {
        Ok(ArborRequest::MemoryTree { owner })
    })
    .await
}

pub async fn visualization_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Json(request): Json<VisualizationRequest>,
) -> impl IntoResponse {
    owned(&state, &headers, StatusCode::OK, |owner| {
        Ok(ArborRequest::Visualize { owner, request })
    })
    .await
}

// ============================================================================
// Helpers
// ============================================================================

/// Convert an IPC `ArborResponse` into an HTTP body value, or a status and message.
pub fn response_to_http(
    response: ArborResponse,
) -> std::result::Result<serde_json::Value, (StatusCode, String)> {
    if response.is_ok() {
        Ok(response.data.unwrap_or(serde_json::json!({})))
    } else {
        Err((
            status_for_code(response.code.as_deref()),
            response.error.unwrap_or_else(|| "unknown error".to_string()),
        ))
    }
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================
