//! HTTP-level tests for the `/api/v1/instances` endpoints.

mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, build_test_app, create_body};
use fleet_lifecycle::testing::FakeOp;
use fleet_runtime::RuntimeError;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_token_is_rejected() {
    let app = build_test_app();
    let response = app.send(Method::GET, "/api/v1/instances", None, None).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn forged_token_is_rejected() {
    let app = build_test_app();
    let response = app.get("/api/v1/instances", "not.a.jwt").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_returns_201_with_url() {
    let app = build_test_app();
    let token = app.token(Uuid::new_v4(), "alice");

    let response = app
        .post_json("/api/v1/instances", &token, create_body("My Cool DB"))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["url"], "http://alice-my-cool-db.example.com");
    assert_eq!(data["instance"]["slug"], "my-cool-db");
    assert_eq!(data["instance"]["subdomain"], "alice-my-cool-db.example.com");
    assert_eq!(data["instance"]["status"], "running");
    assert!(data["instance"]["workload_id"].is_string());
    // Credentials are never echoed back.
    assert!(!json.to_string().contains("correct-horse"));
}

#[tokio::test]
async fn create_validates_body() {
    let app = build_test_app();
    let token = app.token(Uuid::new_v4(), "alice");

    let bodies = [
        serde_json::json!({"name": "ok name", "admin_email": "nope", "admin_password": "long-enough"}),
        serde_json::json!({"name": "ok name", "admin_email": "a@example.com", "admin_password": "short"}),
        serde_json::json!({"name": "ab", "admin_email": "a@example.com", "admin_password": "long-enough"}),
        serde_json::json!({"name": "no!pe", "admin_email": "a@example.com", "admin_password": "long-enough"}),
    ];
    for body in bodies {
        let response = app.post_json("/api/v1/instances", &token, body.clone()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    }
    assert_eq!(app.store.instance_count(), 0);
}

#[tokio::test]
async fn create_rejects_unusable_username() {
    let app = build_test_app();
    let token = app.token(Uuid::new_v4(), "Alice Smith");

    let response = app
        .post_json("/api/v1/instances", &token, create_body("first"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn quota_exceeded_returns_403() {
    let app = build_test_app();
    let token = app.token(Uuid::new_v4(), "alice");
    for i in 0..5 {
        app.create_instance(&token, &format!("db {i}")).await;
    }

    let response = app
        .post_json("/api/v1/instances", &token, create_body("db 5"))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "QUOTA_EXCEEDED");
}

#[tokio::test]
async fn duplicate_name_returns_409() {
    let app = build_test_app();
    let token = app.token(Uuid::new_v4(), "alice");
    app.create_instance(&token, "shop").await;

    let response = app
        .post_json("/api/v1/instances", &token, create_body("Shop"))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");
}

#[tokio::test]
async fn unreachable_runtime_returns_503() {
    let app = build_test_app();
    let token = app.token(Uuid::new_v4(), "alice");
    app.runtime.fail(
        FakeOp::EnsureImage,
        RuntimeError::ConnectionUnavailable("socket missing".into()),
    );

    let response = app
        .post_json("/api/v1/instances", &token, create_body("offline"))
        .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], "RUNTIME_UNAVAILABLE");

    // The instance is kept, marked failed.
    let json = body_json(app.get("/api/v1/instances", &token).await).await;
    assert_eq!(json["data"][0]["status"], "failed");
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_shows_only_own_instances() {
    let app = build_test_app();
    let alice = app.token(Uuid::new_v4(), "alice");
    let bob = app.token(Uuid::new_v4(), "bob");
    app.create_instance(&alice, "one").await;
    app.create_instance(&alice, "two").await;
    app.create_instance(&bob, "three").await;

    let json = body_json(app.get("/api/v1/instances", &alice).await).await;
    let names: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["two", "one"]);
}

#[tokio::test]
async fn other_owners_instance_looks_missing() {
    let app = build_test_app();
    let alice = app.token(Uuid::new_v4(), "alice");
    let bob = app.token(Uuid::new_v4(), "bob");
    let id = app.create_instance(&alice, "private").await;

    let response = app.get(&format!("/api/v1/instances/{id}"), &bob).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");

    let response = app.get(&format!("/api/v1/instances/{id}"), &alice).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["id"], id.as_str());
}

#[tokio::test]
async fn malformed_id_returns_400() {
    let app = build_test_app();
    let token = app.token(Uuid::new_v4(), "alice");
    let response = app.get("/api/v1/instances/not-a-uuid", &token).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn logs_honour_tail() {
    let app = build_test_app();
    let token = app.token(Uuid::new_v4(), "alice");
    let id = app.create_instance(&token, "chatty").await;

    let response = app
        .get(&format!("/api/v1/instances/{id}/logs?tail=all"), &token)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["logs"], "pb-alice-chatty tail=all\n");

    let response = app
        .get(&format!("/api/v1/instances/{id}/logs?tail=0"), &token)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn stats_report_usage_for_running_instance() {
    let app = build_test_app();
    let token = app.token(Uuid::new_v4(), "alice");
    let id = app.create_instance(&token, "busy").await;

    let response = app.get(&format!("/api/v1/instances/{id}/stats"), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "running");
    assert_eq!(json["data"]["workload"]["running"], true);
    assert!(json["data"]["usage"]["memory_bytes"].is_number());
}

#[tokio::test]
async fn orphans_are_listed() {
    let app = build_test_app();
    let token = app.token(Uuid::new_v4(), "alice");
    app.create_instance(&token, "bound").await;
    app.runtime.insert_workload("pb-alice-lost", false);

    let json = body_json(app.get("/api/v1/instances/orphans", &token).await).await;
    let orphans = json["data"].as_array().unwrap();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0]["name"], "pb-alice-lost");
}

// ---------------------------------------------------------------------------
// Power actions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stop_then_start() {
    let app = build_test_app();
    let token = app.token(Uuid::new_v4(), "alice");
    let id = app.create_instance(&token, "cycle").await;

    let response = app.post(&format!("/api/v1/instances/{id}/stop"), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "stopped");

    let response = app.post(&format!("/api/v1/instances/{id}/stop"), &token).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "INVALID_STATE");

    let response = app.post(&format!("/api/v1/instances/{id}/start"), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "running");

    let response = app
        .post(&format!("/api/v1/instances/{id}/restart"), &token)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn runtime_failure_returns_502() {
    let app = build_test_app();
    let token = app.token(Uuid::new_v4(), "alice");
    let id = app.create_instance(&token, "wobbly").await;
    app.runtime
        .fail(FakeOp::Stop, RuntimeError::OperationFailed("daemon error".into()));

    let response = app.post(&format!("/api/v1/instances/{id}/stop"), &token).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["code"], "RUNTIME_ERROR");
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_archives_instance() {
    let app = build_test_app();
    let token = app.token(Uuid::new_v4(), "alice");
    let id = app.create_instance(&token, "gone soon").await;

    let response = app
        .delete(&format!("/api/v1/instances/{id}?reason=migrated"), &token)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.get(&format!("/api/v1/instances/{id}"), &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(app.get("/api/v1/instances/archived", &token).await).await;
    let archived = &json["data"][0];
    assert_eq!(archived["id"], id.as_str());
    assert_eq!(archived["deletion_reason"], "migrated");
    assert_eq!(archived["data_available"], true);
    assert_eq!(archived["original_subdomain"], "alice-gone-soon.example.com");

    // Deleting again finds nothing.
    let response = app.delete(&format!("/api/v1/instances/{id}"), &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
