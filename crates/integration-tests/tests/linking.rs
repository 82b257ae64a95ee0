//! Identity resolution across the purchase-then-sign-in flow: email
//! matching, one-shot linking, conflict handling, and the steady-state
//! fast path.

use axum::http::StatusCode;
use leadflow_core::{Email, SubjectId};
use leadflow_integration_tests::{TestHarness, body_json};
use leadflow_server::db::Store;
use serde_json::json;

fn order_body(order_number: u64, email: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "meta": { "event_name": "order_created" },
        "data": {
            "id": "evt_1",
            "attributes": {
                "order_number": order_number,
                "user_name": "Ada Lovelace",
                "user_email": email,
                "currency": "USD",
                "status": "paid",
                "total": 4900,
                "first_order_item": { "product_name": "Leadflow CRM" }
            }
        }
    }))
    .expect("payload")
}

#[tokio::test]
async fn first_sign_in_links_the_purchase_made_before_signup() {
    let harness = TestHarness::new();

    // Purchase arrives first; the payer has no account yet.
    let response = harness
        .post_payment_webhook(&order_body(1001, "ada@example.com"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Then they sign up with the same email and call the API.
    let session = harness.session_for("user_ada", "ada@example.com").await;
    let response = harness.get("/api/leads", Some(&session)).await;
    assert_eq!(response.status(), StatusCode::OK, "purchase entitles the caller");

    let email: Email = "ada@example.com".parse().expect("email");
    let user = harness
        .store
        .user_by_email(&email)
        .await
        .expect("lookup")
        .expect("user");
    assert_eq!(
        user.external_subject_id,
        Some(SubjectId::new("user_ada")),
        "resolution linked the subject"
    );
}

#[tokio::test]
async fn second_subject_with_the_same_email_cannot_steal_the_link() {
    let harness = TestHarness::new();
    harness
        .post_payment_webhook(&order_body(1001, "ada@example.com"))
        .await;

    // First subject links.
    let first = harness.session_for("user_ada", "ada@example.com").await;
    assert_eq!(
        harness.get("/api/leads", Some(&first)).await.status(),
        StatusCode::OK
    );

    // A different subject claiming the same email resolves to nothing.
    let second = harness.session_for("user_imposter", "ada@example.com").await;
    let response = harness.get("/api/leads", Some(&second)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error = body_json(response).await;
    assert_eq!(error["error"], "User not found");

    // The original link is untouched.
    let email: Email = "ada@example.com".parse().expect("email");
    let user = harness
        .store
        .user_by_email(&email)
        .await
        .expect("lookup")
        .expect("user");
    assert_eq!(user.external_subject_id, Some(SubjectId::new("user_ada")));
}

#[tokio::test]
async fn linked_subjects_skip_the_provider_on_later_requests() {
    let harness = TestHarness::new();
    harness
        .post_payment_webhook(&order_body(1001, "ada@example.com"))
        .await;

    let session = harness.session_for("user_ada", "ada@example.com").await;

    // First call resolves via the provider and links.
    assert_eq!(
        harness.get("/api/leads", Some(&session)).await.status(),
        StatusCode::OK
    );
    let fetches_after_link = harness.identity.profile_fetches();
    assert!(fetches_after_link >= 1);

    // Steady state: subject lookups only, no provider round-trips.
    for _ in 0..3 {
        assert_eq!(
            harness.get("/api/leads", Some(&session)).await.status(),
            StatusCode::OK
        );
    }
    assert_eq!(
        harness.identity.profile_fetches(),
        fetches_after_link,
        "linked resolution is store-only"
    );
}

#[tokio::test]
async fn subject_unknown_to_the_provider_cannot_resolve() {
    let harness = TestHarness::new();

    // Token is valid but the provider has no profile for the subject.
    let subject = SubjectId::new("user_ghost");
    harness.identity.add_token("tok_ghost", &subject);
    let session = harness.sign_in("tok_ghost").await;

    let response = harness.get("/api/leads", Some(&session)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let error = body_json(response).await;
    assert_eq!(error["error"], "User not found");
}

#[tokio::test]
async fn profile_without_a_matching_user_cannot_resolve() {
    let harness = TestHarness::new();

    // No purchase, no identity event: nothing to match the email against.
    let session = harness.session_for("user_ada", "ada@example.com").await;

    let response = harness.get("/api/leads", Some(&session)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn identity_event_then_purchase_then_sign_in_all_converge() {
    let harness = TestHarness::new();

    // Provider pushes the account first.
    let created = serde_json::to_vec(&json!({
        "type": "user.created",
        "data": {
            "id": "user_ada",
            "email_addresses": [
                { "id": "em_1", "email_address": "ada@example.com" }
            ],
            "primary_email_address_id": "em_1",
            "first_name": "Ada",
            "last_name": "Lovelace"
        }
    }))
    .expect("payload");
    assert_eq!(
        harness.post_identity_webhook(&created).await.status(),
        StatusCode::OK
    );

    // Purchase lands on the already-linked user via the email match.
    assert_eq!(
        harness
            .post_payment_webhook(&order_body(1001, "ada@example.com"))
            .await
            .status(),
        StatusCode::OK
    );

    let session = harness.session_for("user_ada", "ada@example.com").await;
    assert_eq!(
        harness.get("/api/leads", Some(&session)).await.status(),
        StatusCode::OK
    );

    // One user row absorbed all three flows.
    let email: Email = "ada@example.com".parse().expect("email");
    let user = harness
        .store
        .user_by_email(&email)
        .await
        .expect("lookup")
        .expect("user");
    assert_eq!(harness.store.count_purchases(user.id).await.expect("count"), 1);
}
