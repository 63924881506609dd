//! End-to-end tests of the HTTP API over an in-memory backend.

mod common;

use std::time::Duration;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use serde_json::{Value, json};
use tessera_auth::UserInfo;
use tessera_server::{ErrorResponse, RunResponse};
use tessera_store::{WorkflowFilter, WorkflowRepository};
use tessera_types::WorkflowState;

use common::{RESTRICTED_DEF, TestApp, json_body, jwt};

fn run_body(id: &str) -> Value {
    json!({"id": id, "input_dir": "cohort-a", "output_dir": "results/a"})
}

async fn start_run(app: &TestApp) -> RunResponse {
    let response = app
        .as_alice(Method::POST, "/api/run", Some(run_body(RESTRICTED_DEF)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

/// Poll the store until the workflow reaches a terminal state.
async fn wait_terminal(app: &TestApp, id: uuid::Uuid) -> WorkflowState {
    for _ in 0..200 {
        let record = app.repo.get_one(&WorkflowFilter::by_id(id)).unwrap();
        if let Some(record) = record
            && record.state.is_terminal()
        {
            return record.state;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("workflow {id} never finished");
}

// ─────────────────────────────────────────────────────────────────────────────
// Health
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_needs_no_credentials() {
    let app = TestApp::new();
    let response = app.send(Method::GET, "/health", None, None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_ready_when_store_and_definitions_available() {
    let app = TestApp::new();
    let response = app.send(Method::GET, "/health/ready", None, None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = json_body(response).await;
    assert_eq!(body["ready"], true);
}

#[tokio::test]
async fn test_not_ready_without_definitions() {
    let app = TestApp::new();
    std::fs::remove_dir_all(app.root().join("definitions")).unwrap();

    let response = app.send(Method::GET, "/health/ready", None, None, None).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = json_body(response).await;
    assert_eq!(body["ready"], false);
    assert_eq!(body["store"], "ok");
}

// ─────────────────────────────────────────────────────────────────────────────
// Authentication
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_username_is_unauthorized() {
    let app = TestApp::new();
    let response = app
        .send(Method::GET, "/api/workflow", None, Some(&app.alice), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body: ErrorResponse = json_body(response).await;
    assert_eq!(body.code, "unauthorized");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new();
    let response = app
        .send(Method::GET, "/api/workflow", Some("alice"), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_inactive_token_is_unauthorized() {
    let app = TestApp::new();
    let token = jwt("carol@example.org", Utc::now().timestamp() + 3600);
    app.provider.insert(token.clone(), false, UserInfo::default());

    let response = app
        .send(Method::GET, "/api/workflow", Some("carol"), Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_unauthorized() {
    let app = TestApp::new();
    let token = jwt("dave@example.org", Utc::now().timestamp() - 600);
    app.provider.insert(token.clone(), true, UserInfo::default());

    let response = app
        .send(Method::GET, "/api/workflow", Some("dave"), Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_token_is_unauthorized() {
    let app = TestApp::new();
    let token = jwt("eve@example.org", Utc::now().timestamp() + 3600);
    let response = app
        .send(Method::GET, "/api/workflow", Some("eve"), Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ─────────────────────────────────────────────────────────────────────────────
// Run
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_run_without_entitlement_is_forbidden() {
    let app = TestApp::new();
    let response = app
        .as_bob(Method::POST, "/api/run", Some(run_body(RESTRICTED_DEF)))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.repo.get_many(&WorkflowFilter::by_owner("bob")).unwrap().is_empty());
}

#[tokio::test]
async fn test_run_unknown_definition_is_not_found() {
    let app = TestApp::new();
    let unknown = uuid::Uuid::new_v4().to_string();
    let response = app
        .as_alice(Method::POST, "/api/run", Some(run_body(&unknown)))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_run_malformed_definition_id_is_bad_request() {
    let app = TestApp::new();
    let response = app
        .as_alice(Method::POST, "/api/run", Some(run_body("not-a-uuid")))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_run_records_workflow_for_caller() {
    let app = TestApp::new();
    let started = start_run(&app).await;

    let record = app
        .repo
        .get_one(&WorkflowFilter::by_id(started.workflow_id))
        .unwrap()
        .unwrap();
    assert_eq!(record.created_by, "alice");

    let response = app.as_alice(Method::GET, "/api/workflow", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let list: Vec<Value> = json_body(response).await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], started.workflow_id.to_string());

    // The pipeline binary does not exist, so the run fails in the background.
    assert_eq!(wait_terminal(&app, started.workflow_id).await, WorkflowState::Failed);
}

// ─────────────────────────────────────────────────────────────────────────────
// Detail and cancel
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_detail_for_owner() {
    let app = TestApp::new();
    let started = start_run(&app).await;
    wait_terminal(&app, started.workflow_id).await;

    let uri = format!("/api/workflow/{}", started.workflow_id);
    let response = app.as_alice(Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let detail: Value = json_body(response).await;
    assert_eq!(detail["id"], started.workflow_id.to_string());
    assert_eq!(detail["state"], "FAILED");
    assert!(detail["jobs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_detail_hidden_from_other_users() {
    let app = TestApp::new();
    let started = start_run(&app).await;

    let uri = format!("/api/workflow/{}", started.workflow_id);
    let response = app.as_bob(Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.as_bob(Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.as_bob(Method::GET, "/api/workflow", None).await;
    let list: Vec<Value> = json_body(response).await;
    assert!(list.is_empty());
}

#[tokio::test]
async fn test_detail_unknown_and_malformed_ids() {
    let app = TestApp::new();
    let uri = format!("/api/workflow/{}", uuid::Uuid::new_v4());
    let response = app.as_alice(Method::GET, &uri, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.as_alice(Method::GET, "/api/workflow/nope", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_finished_workflow_is_accepted() {
    let app = TestApp::new();
    let started = start_run(&app).await;
    wait_terminal(&app, started.workflow_id).await;

    let uri = format!("/api/workflow/{}", started.workflow_id);
    let response = app.as_alice(Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = json_body(response).await;
    assert_eq!(
        body["message"],
        format!("Workflow {} canceled", started.workflow_id)
    );

    // Terminal states are final.
    let record = app
        .repo
        .get_one(&WorkflowFilter::by_id(started.workflow_id))
        .unwrap()
        .unwrap();
    assert_eq!(record.state, WorkflowState::Failed);
}

// ─────────────────────────────────────────────────────────────────────────────
// Definitions
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_definitions() {
    let app = TestApp::new();
    let response = app
        .as_bob(Method::GET, "/api/workflow_definition", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let list: Vec<Value> = json_body(response).await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], RESTRICTED_DEF);
    assert_eq!(list[0]["name"], "Restricted");
    assert!(list[0]["definition"].as_str().unwrap().contains("rule all"));
}
