//! HTTP side-car surface
//!
//! ## Endpoints
//!
//! - `POST /v1/allowed` - Authorization check, optionally on one resource
//! - `POST /v1/predicate` - Query predicate for bulk prefiltering
//! - `GET /v1/permissions` - Registered permissions
//! - `GET /v1/permissions/:name` - One permission
//! - `POST /v1/policies/validate` - Validate a blueprint policy payload
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics (separate router)
//!
//! ## Trust
//!
//! The side-car answers for whatever actor the request body names, including
//! its superuser flag. It must only be reachable by the trusted backend that
//! authenticated that actor, never by browsers. No CORS headers are emitted,
//! so cross-origin pages cannot read its responses.

use crate::blueprint::Policy;
use crate::engine::{DecisionSource, Evaluator};
use crate::error::{AuthzError, ConfigurationError, LookupError, PolicyValidationError};
use crate::permission::Permission;
use crate::predicate::{Predicate, QueryPredicateBuilder};
use crate::types::{Actor, Resource, ResourceAttributes, ResourceRef, ResourceType};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    evaluator: Arc<Evaluator>,
    predicates: Arc<QueryPredicateBuilder>,
    start_time: Instant,
}

impl AppState {
    pub fn new(evaluator: Arc<Evaluator>, predicates: Arc<QueryPredicateBuilder>) -> Self {
        Self {
            evaluator,
            predicates,
            start_time: Instant::now(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Engine error rendered as an HTTP response
#[derive(Debug)]
pub struct AppError(AuthzError);

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            AuthzError::Configuration(ConfigurationError::UnknownPermission(_)) => {
                (StatusCode::NOT_FOUND, "unknown_permission")
            }
            AuthzError::Configuration(_) => (StatusCode::BAD_REQUEST, "configuration_error"),
            AuthzError::PolicyValidation(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "policy_validation_error")
            }
            AuthzError::Lookup(LookupError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, "resource_not_found")
            }
            AuthzError::Lookup(LookupError::Unavailable { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "lookup_unavailable")
            }
            AuthzError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AuthzError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AuthzError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_code();

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: self.0.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<AuthzError> for AppError {
    fn from(err: AuthzError) -> Self {
        AppError(err)
    }
}

impl From<ConfigurationError> for AppError {
    fn from(err: ConfigurationError) -> Self {
        AppError(err.into())
    }
}

impl From<PolicyValidationError> for AppError {
    fn from(err: PolicyValidationError) -> Self {
        AppError(err.into())
    }
}

/// Resource in a check request; attributes are resolved server-side when absent
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceInput {
    #[serde(flatten)]
    pub reference: ResourceRef,

    #[serde(default)]
    pub attributes: Option<ResourceAttributes>,
}

/// Authorization check request
#[derive(Debug, Deserialize)]
pub struct AllowedRequest {
    pub actor: Actor,
    pub permission: String,
    #[serde(default)]
    pub resource: Option<ResourceInput>,
}

/// Authorization check response
#[derive(Debug, Serialize, Deserialize)]
pub struct AllowedResponse {
    pub allowed: bool,
    pub source: DecisionSource,
    pub decision_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PredicateRequest {
    pub actor: Actor,
    pub permission: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidatePolicyRequest {
    pub resource_type: ResourceType,
    pub policy: serde_json::Value,
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    version: String,
}

/// Metrics response (Prometheus format)
struct MetricsResponse {
    metrics: String,
}

impl IntoResponse for MetricsResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            self.metrics,
        )
            .into_response()
    }
}

/// POST /v1/allowed - Check authorization
async fn allowed(
    State(state): State<AppState>,
    Json(req): Json<AllowedRequest>,
) -> Result<Json<AllowedResponse>, AppError> {
    info!(
        "Authorization check: actor={}, permission={}, resource={:?}",
        req.actor.id,
        req.permission,
        req.resource.as_ref().map(|r| r.reference.url.as_str())
    );

    let decision = match req.resource {
        Some(ResourceInput {
            reference,
            attributes: Some(attributes),
        }) => {
            let resource = Resource::new(reference, attributes);
            state.evaluator.decide_on(&req.actor, &req.permission, &resource).await?
        }
        Some(ResourceInput {
            reference,
            attributes: None,
        }) => {
            state
                .evaluator
                .decide(&req.actor, &req.permission, Some(&reference))
                .await?
        }
        None => state.evaluator.decide(&req.actor, &req.permission, None).await?,
    };

    info!(
        "Authorization decision: {} ({})",
        if decision.allowed { "ALLOW" } else { "DENY" },
        req.permission
    );

    Ok(Json(AllowedResponse {
        allowed: decision.allowed,
        source: decision.source,
        decision_id: decision.id,
        timestamp: decision.timestamp,
    }))
}

/// POST /v1/predicate - Build a prefilter predicate
async fn predicate(
    State(state): State<AppState>,
    Json(req): Json<PredicateRequest>,
) -> Result<Json<Predicate>, AppError> {
    let predicate = state.predicates.build(&req.actor, &req.permission).await?;
    Ok(Json(predicate))
}

/// GET /v1/permissions
async fn list_permissions(State(state): State<AppState>) -> Json<Vec<Permission>> {
    Json(state.evaluator.registry().iter().cloned().collect())
}

/// GET /v1/permissions/:name
async fn get_permission(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Permission>, AppError> {
    let permission = state.evaluator.registry().lookup(&name)?;
    Ok(Json(permission.clone()))
}

/// POST /v1/policies/validate - Normalize a policy payload or reject it
async fn validate_policy(Json(req): Json<ValidatePolicyRequest>) -> Result<Json<Policy>, AppError> {
    let policy = Policy::validate_for(req.resource_type, &req.policy)?;
    Ok(Json(policy))
}

/// GET /health - Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = state.start_time.elapsed().as_secs();

    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: uptime,
        version: crate::VERSION.to_string(),
    })
}

/// GET /metrics - Prometheus metrics endpoint
async fn metrics(State(state): State<AppState>) -> MetricsResponse {
    let uptime = state.start_time.elapsed().as_secs();

    let mut metrics = format!(
        "# HELP casegate_uptime_seconds Server uptime in seconds\n\
         # TYPE casegate_uptime_seconds gauge\n\
         casegate_uptime_seconds {}\n\
         \n\
         # HELP casegate_version Server version info\n\
         # TYPE casegate_version gauge\n\
         casegate_version{{version=\"{}\"}} 1\n",
        uptime,
        crate::VERSION
    );

    if let Some(engine_metrics) = state.evaluator.export_metrics() {
        metrics.push('\n');
        metrics.push_str(&engine_metrics);
    }

    MetricsResponse { metrics }
}

/// Create the HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http()
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/v1/allowed", post(allowed))
        .route("/v1/predicate", post(predicate))
        .route("/v1/permissions", get(list_permissions))
        .route("/v1/permissions/:name", get(get_permission))
        .route("/v1/policies/validate", post(validate_policy))
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(trace))
        .with_state(state)
}

/// Create the metrics router
pub fn create_metrics_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .with_state(state)
}
