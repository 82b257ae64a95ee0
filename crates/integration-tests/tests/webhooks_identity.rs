//! Identity webhook end-to-end: signature enforcement and user sync.

use axum::http::StatusCode;
use leadflow_core::SubjectId;
use leadflow_integration_tests::{
    IDENTITY_WEBHOOK_SECRET, TestHarness, body_json, config_without_webhook_secrets,
    sign_identity_payload,
};
use leadflow_server::db::Store;
use serde_json::json;

fn user_created_body(subject: &str, email: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "user.created",
        "data": {
            "id": subject,
            "email_addresses": [
                { "id": "em_1", "email_address": email }
            ],
            "primary_email_address_id": "em_1",
            "first_name": "Ada",
            "last_name": "Lovelace"
        }
    }))
    .expect("payload")
}

#[tokio::test]
async fn user_created_syncs_a_linked_user() {
    let harness = TestHarness::new();

    let response = harness
        .post_identity_webhook(&user_created_body("user_ada", "ada@example.com"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let message = body_json(response).await;
    assert_eq!(message["message"], "Webhook processed");

    let user = harness
        .store
        .user_by_subject(&SubjectId::new("user_ada"))
        .await
        .expect("lookup")
        .expect("user synced");
    assert_eq!(user.email.as_str(), "ada@example.com");
    assert_eq!(user.full_name.as_deref(), Some("Ada Lovelace"));
}

#[tokio::test]
async fn user_updated_rewrites_the_same_user() {
    let harness = TestHarness::new();
    harness
        .post_identity_webhook(&user_created_body("user_ada", "ada@example.com"))
        .await;

    let update = serde_json::to_vec(&json!({
        "type": "user.updated",
        "data": {
            "id": "user_ada",
            "email_addresses": [
                { "id": "em_2", "email_address": "ada@lovelace.example" }
            ],
            "primary_email_address_id": "em_2",
            "first_name": "Ada",
            "last_name": "King"
        }
    }))
    .expect("payload");

    let response = harness.post_identity_webhook(&update).await;
    assert_eq!(response.status(), StatusCode::OK);

    let user = harness
        .store
        .user_by_subject(&SubjectId::new("user_ada"))
        .await
        .expect("lookup")
        .expect("user present");
    assert_eq!(user.email.as_str(), "ada@lovelace.example");
    assert_eq!(user.full_name.as_deref(), Some("Ada King"));
}

#[tokio::test]
async fn tampered_body_is_rejected() {
    let harness = TestHarness::new();
    let body = user_created_body("user_ada", "ada@example.com");

    let id = "msg_1";
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature = sign_identity_payload(IDENTITY_WEBHOOK_SECRET, id, &timestamp, &body);

    let mut tampered = body.clone();
    tampered.extend_from_slice(b" ");
    let response = harness
        .post_identity_webhook_raw(&tampered, id, &timestamp, &signature)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let error = body_json(response).await;
    assert_eq!(error["error"], "Invalid signature");
}

#[tokio::test]
async fn missing_headers_are_a_bad_request() {
    let harness = TestHarness::new();
    let body = user_created_body("user_ada", "ada@example.com");

    // No svix headers at all.
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/webhooks/identity")
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(body))
        .expect("request");
    let response = harness.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stale_timestamp_is_rejected() {
    let harness = TestHarness::new();
    let body = user_created_body("user_ada", "ada@example.com");

    let id = "msg_1";
    let timestamp = (chrono::Utc::now().timestamp() - 3600).to_string();
    let signature = sign_identity_payload(IDENTITY_WEBHOOK_SECRET, id, &timestamp, &body);

    let response = harness
        .post_identity_webhook_raw(&body, id, &timestamp, &signature)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn event_without_email_is_rejected() {
    let harness = TestHarness::new();
    let body = serde_json::to_vec(&json!({
        "type": "user.created",
        "data": {
            "id": "user_ada",
            "email_addresses": [],
            "first_name": "Ada"
        }
    }))
    .expect("payload");

    let response = harness.post_identity_webhook(&body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert_eq!(error["error"], "Email is required");
}

#[tokio::test]
async fn unhandled_event_types_are_acknowledged() {
    let harness = TestHarness::new();
    let body = serde_json::to_vec(&json!({
        "type": "user.deleted",
        "data": { "id": "user_ada", "email_addresses": [] }
    }))
    .expect("payload");

    let response = harness.post_identity_webhook(&body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let message = body_json(response).await;
    assert_eq!(message["message"], "Webhook received");

    let user = harness
        .store
        .user_by_subject(&SubjectId::new("user_ada"))
        .await
        .expect("lookup");
    assert!(user.is_none(), "ignored events write nothing");
}

#[tokio::test]
async fn unset_secret_is_a_server_error() {
    let harness = TestHarness::with_config(config_without_webhook_secrets());
    let body = user_created_body("user_ada", "ada@example.com");

    let response = harness.post_identity_webhook(&body).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error = body_json(response).await;
    assert_eq!(error["error"], "Webhook secret not configured");
}
