//! HTTP surface tests
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use casegate_authz::{
    config::AuthzConfig,
    engine::{DecisionSource, Evaluator, EvaluatorConfig},
    server::{create_metrics_router, create_router, AllowedResponse, AppState, ErrorResponse},
    InMemoryGrantStore, InMemoryResourceDirectory, ObjectAttributes, Permission, Policy, Predicate,
    QueryPredicateBuilder, ResourceRef, ConfidentialityLevel,
};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const CONFIG: &str = r#"
[[roles]]
name = "reader"
permissions = ["cases:read"]

[[profiles]]
name = "acme readers"
members = ["alice"]

[[profiles.grants]]
role = "reader"
resource_type = "case"
policy = { catalog = "ACME", typeIdentifier = "", maxClassification = "internal" }
"#;

async fn routers() -> (Router, Router) {
    let config = AuthzConfig::from_toml(CONFIG).unwrap();
    let registry = Arc::new(config.build_registry().unwrap());
    let store = Arc::new(InMemoryGrantStore::new(registry.clone()));
    config
        .seed(&store, Utc::now() - chrono::Duration::minutes(1))
        .await
        .unwrap();

    let directory = Arc::new(InMemoryResourceDirectory::new());
    directory
        .insert(
            ResourceRef::case("https://cases.example.com/cases/known"),
            ObjectAttributes::new("ACME", "permit", ConfidentialityLevel::Public),
        )
        .await;

    let evaluator = Evaluator::new(EvaluatorConfig::default(), registry.clone(), store.clone(), directory);
    let predicates = QueryPredicateBuilder::new(registry, store);
    let state = AppState::new(Arc::new(evaluator), Arc::new(predicates));

    (create_router(state.clone()), create_metrics_router(state))
}

async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn test_allowed_with_inline_attributes() {
    let (app, _) = routers().await;

    let request = |classification: &str| {
        json!({
            "actor": {"id": "alice"},
            "permission": "cases:read",
            "resource": {
                "type": "case",
                "url": "https://cases.example.com/cases/1",
                "attributes": {
                    "kind": "object",
                    "catalog": "ACME",
                    "typeIdentifier": "permit",
                    "classification": classification
                }
            }
        })
    };

    let (status, body) = post_json(app.clone(), "/v1/allowed", request("public")).await;
    assert_eq!(status, StatusCode::OK);
    let response: AllowedResponse = serde_json::from_value(body).unwrap();
    assert!(response.allowed);
    assert!(matches!(response.source, DecisionSource::BlueprintGrant { ref role, .. } if role == "reader"));

    let (status, body) = post_json(app, "/v1/allowed", request("secret")).await;
    assert_eq!(status, StatusCode::OK);
    let response: AllowedResponse = serde_json::from_value(body).unwrap();
    assert!(!response.allowed);
    assert_eq!(response.source, DecisionSource::NoMatchingGrant);
}

#[tokio::test]
async fn test_allowed_resolves_missing_attributes() {
    let (app, _) = routers().await;

    let (status, body) = post_json(
        app.clone(),
        "/v1/allowed",
        json!({
            "actor": {"id": "alice"},
            "permission": "cases:read",
            "resource": {"type": "case", "url": "https://cases.example.com/cases/known"}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], true);

    let (status, body) = post_json(
        app,
        "/v1/allowed",
        json!({
            "actor": {"id": "alice"},
            "permission": "cases:read",
            "resource": {"type": "case", "url": "https://cases.example.com/cases/unknown"}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: ErrorResponse = serde_json::from_value(body).unwrap();
    assert_eq!(error.error, "resource_not_found");
}

#[tokio::test]
async fn test_allowed_without_resource() {
    let (app, _) = routers().await;

    let (_, body) = post_json(
        app.clone(),
        "/v1/allowed",
        json!({"actor": {"id": "alice"}, "permission": "cases:read"}),
    )
    .await;
    assert_eq!(body["allowed"], true);

    let (_, body) = post_json(
        app.clone(),
        "/v1/allowed",
        json!({"actor": {"id": "bob"}, "permission": "cases:read"}),
    )
    .await;
    assert_eq!(body["allowed"], false);

    let (_, body) = post_json(
        app,
        "/v1/allowed",
        json!({"actor": {"id": "bob", "is_superuser": true}, "permission": "cases:read"}),
    )
    .await;
    assert_eq!(body["allowed"], true);
    assert_eq!(body["source"]["type"], "superuser");
}

#[tokio::test]
async fn test_unknown_permission_is_not_found() {
    let (app, _) = routers().await;

    let (status, body) = post_json(
        app.clone(),
        "/v1/allowed",
        json!({"actor": {"id": "alice"}, "permission": "cases:fly"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "unknown_permission");

    let (status, _) = get(app, "/v1/permissions/cases:fly").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_predicate_endpoint() {
    let (app, _) = routers().await;

    let (status, body) = post_json(
        app.clone(),
        "/v1/predicate",
        json!({"actor": {"id": "alice"}, "permission": "cases:read"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let predicate: Predicate = serde_json::from_value(body).unwrap();
    assert!(matches!(predicate, Predicate::All { .. }));

    let (_, body) = post_json(
        app,
        "/v1/predicate",
        json!({"actor": {"id": "bob"}, "permission": "cases:read"}),
    )
    .await;
    assert_eq!(body, json!({"op": "never"}));
}

#[tokio::test]
async fn test_permission_listing() {
    let (app, _) = routers().await;

    let (status, body) = get(app.clone(), "/v1/permissions").await;
    assert_eq!(status, StatusCode::OK);
    let permissions: Vec<Permission> = serde_json::from_slice(&body).unwrap();
    assert!(permissions.iter().any(|p| p.name == "reports:read"));

    let (status, body) = get(app, "/v1/permissions/documents:lock").await;
    assert_eq!(status, StatusCode::OK);
    let permission: Permission = serde_json::from_slice(&body).unwrap();
    assert_eq!(permission.name, "documents:lock");
}

#[tokio::test]
async fn test_policy_validation_endpoint() {
    let (app, _) = routers().await;

    let (status, body) = post_json(
        app.clone(),
        "/v1/policies/validate",
        json!({
            "resource_type": "document",
            "policy": {"catalog": "ACME", "typeIdentifier": "", "maxClassification": "secret"}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let policy: Policy = serde_json::from_value(body).unwrap();
    assert!(matches!(policy, Policy::Object(_)));

    let (status, body) = post_json(
        app,
        "/v1/policies/validate",
        json!({
            "resource_type": "case",
            "policy": {"catalog": "ACME", "typeIdentifier": "", "maxClassification": "ultra"}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "policy_validation_error");
}

#[tokio::test]
async fn test_health_and_metrics() {
    let (app, metrics) = routers().await;

    let (status, body) = get(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");

    post_json(
        app,
        "/v1/allowed",
        json!({"actor": {"id": "alice"}, "permission": "cases:read"}),
    )
    .await;

    let (status, body) = get(metrics, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("casegate_uptime_seconds"));
    assert!(text.contains("casegate_checks_total 1"));
}

#[tokio::test]
async fn test_cross_origin_requests_get_no_cors_headers() {
    let (app, _) = routers().await;

    let preflight = app
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/v1/allowed")
                .header("origin", "https://evil.example.com")
                .header("access-control-request-method", "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(preflight.headers().get("access-control-allow-origin").is_none());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/allowed")
                .header("origin", "https://evil.example.com")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"actor": {"id": "mallory", "is_superuser": true}, "permission": "cases:read"})
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.headers().get("access-control-allow-origin").is_none());
}
