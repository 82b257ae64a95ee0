//! In-process integration test harness.
//!
//! Drives the real router through `tower::ServiceExt::oneshot` with the
//! in-memory store, an in-memory session store, and a scripted identity
//! provider, so the full HTTP surface (routing, middleware, sessions,
//! webhook signatures) is exercised without a network or a database.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p leadflow-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
// Harness helpers panic on fixture misuse rather than returning errors.
#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, header};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use secrecy::SecretString;
use sha2::Sha256;
use tower::ServiceExt;

use leadflow_core::{Email, SubjectId};
use leadflow_server::config::{IdentityProviderConfig, PaymentProviderConfig, ServerConfig};
use leadflow_server::db::{MemoryStore, Store};
use leadflow_server::identity::{IdentityError, IdentityProvider, SubjectProfile};
use leadflow_server::middleware::create_session_layer;
use leadflow_server::models::NewPurchase;
use leadflow_server::router;
use leadflow_server::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Identity webhook secret the harness configures; decodes to 32 zero bytes.
pub const IDENTITY_WEBHOOK_SECRET: &str = "whsec_AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

/// Payment webhook secret the harness configures.
pub const PAYMENT_WEBHOOK_SECRET: &str = "payment-signing-secret-for-tests";

/// Identity provider scripted per test.
///
/// Profiles and session tokens are registered up front; `profile_fetches`
/// counts provider round-trips so tests can assert the resolver's fast
/// path stays off the network.
#[derive(Debug, Default)]
pub struct FakeIdentityProvider {
    profiles: std::sync::RwLock<HashMap<SubjectId, SubjectProfile>>,
    tokens: std::sync::RwLock<HashMap<String, SubjectId>>,
    profile_fetches: AtomicUsize,
    fail_profile_fetches: AtomicBool,
}

impl FakeIdentityProvider {
    pub fn add_profile(&self, profile: SubjectProfile) {
        self.profiles
            .write()
            .expect("profiles lock")
            .insert(profile.subject_id.clone(), profile);
    }

    pub fn add_token(&self, token: &str, subject: &SubjectId) {
        self.tokens
            .write()
            .expect("tokens lock")
            .insert(token.to_owned(), subject.clone());
    }

    /// Number of `fetch_profile` calls made so far.
    pub fn profile_fetches(&self) -> usize {
        self.profile_fetches.load(Ordering::SeqCst)
    }

    /// Makes every subsequent profile fetch fail with an API error.
    pub fn set_profile_failure(&self, fail: bool) {
        self.fail_profile_fetches.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn fetch_profile(&self, subject: &SubjectId) -> Result<SubjectProfile, IdentityError> {
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_profile_fetches.load(Ordering::SeqCst) {
            return Err(IdentityError::Api {
                status: 500,
                message: "scripted failure".to_owned(),
            });
        }
        self.profiles
            .read()
            .expect("profiles lock")
            .get(subject)
            .cloned()
            .ok_or(IdentityError::SubjectNotFound)
    }

    async fn verify_session_token(&self, token: &str) -> Result<SubjectId, IdentityError> {
        self.tokens
            .read()
            .expect("tokens lock")
            .get(token)
            .cloned()
            .ok_or(IdentityError::TokenRejected)
    }
}

/// Configuration the harness boots the router with.
#[must_use]
pub fn test_config() -> ServerConfig {
    ServerConfig {
        database_url: SecretString::from("postgres://unused".to_owned()),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://localhost:8080".to_owned(),
        identity: IdentityProviderConfig {
            api_url: "http://identity.invalid".to_owned(),
            api_token: SecretString::from("test-api-token".to_owned()),
            webhook_secret: Some(SecretString::from(IDENTITY_WEBHOOK_SECRET.to_owned())),
        },
        payment: PaymentProviderConfig {
            webhook_secret: Some(SecretString::from(PAYMENT_WEBHOOK_SECRET.to_owned())),
        },
        sentry_dsn: None,
    }
}

/// Same configuration with both webhook secrets unset, for exercising the
/// misconfiguration responses.
#[must_use]
pub fn config_without_webhook_secrets() -> ServerConfig {
    let mut config = test_config();
    config.identity.webhook_secret = None;
    config.payment.webhook_secret = None;
    config
}

/// One router instance plus handles on its fakes.
pub struct TestHarness {
    app: Router,
    pub store: Arc<MemoryStore>,
    pub identity: Arc<FakeIdentityProvider>,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    #[must_use]
    pub fn with_config(config: ServerConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(FakeIdentityProvider::default());

        let session_store = tower_sessions::MemoryStore::default();
        let session_layer = create_session_layer(session_store, &config);

        let state = AppState::new(config, store.clone(), identity.clone());
        let app = router(state).layer(session_layer);

        Self {
            app,
            store,
            identity,
        }
    }

    /// Sends one request through the full middleware stack.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, path: &str, session: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(cookie) = session {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request")).await
    }

    pub async fn post_json(
        &self,
        path: &str,
        session: Option<&str>,
        body: &serde_json::Value,
    ) -> Response<Body> {
        self.send_json("POST", path, session, body).await
    }

    pub async fn patch_json(
        &self,
        path: &str,
        session: Option<&str>,
        body: &serde_json::Value,
    ) -> Response<Body> {
        self.send_json("PATCH", path, session, body).await
    }

    pub async fn delete(&self, path: &str, session: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("DELETE").uri(path);
        if let Some(cookie) = session {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).expect("request")).await
    }

    async fn send_json(
        &self,
        method: &str,
        path: &str,
        session: Option<&str>,
        body: &serde_json::Value,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = session {
            builder = builder.header(header::COOKIE, cookie);
        }
        let payload = serde_json::to_vec(body).expect("serializable body");
        self.send(builder.body(Body::from(payload)).expect("request"))
            .await
    }

    /// Exchanges a registered token for a session cookie.
    ///
    /// # Panics
    ///
    /// Panics unless the exchange returns 204 with a session cookie.
    pub async fn sign_in(&self, token: &str) -> String {
        let response = self
            .post_json("/auth/session", None, &serde_json::json!({ "token": token }))
            .await;
        assert_eq!(response.status(), 204, "session exchange should succeed");
        session_cookie(&response).expect("session cookie issued")
    }

    /// Registers a profile and token for `subject` and signs in, without
    /// creating any user or purchase rows. Resolution runs on first use.
    pub async fn session_for(&self, subject: &str, email: &str) -> String {
        let subject_id = SubjectId::new(subject);
        let parsed = Email::parse(email).expect("valid email");
        self.identity.add_profile(SubjectProfile {
            subject_id: subject_id.clone(),
            email: Some(parsed),
            first_name: None,
            last_name: None,
        });
        let token = format!("tok_{subject}");
        self.identity.add_token(&token, &subject_id);
        self.sign_in(&token).await
    }

    /// Seeds a linked user with no purchases and signs in. The caller
    /// resolves but is not entitled.
    pub async fn linked_session(&self, subject: &str, email: &str) -> String {
        let subject_id = SubjectId::new(subject);
        let parsed = Email::parse(email).expect("valid email");
        self.store
            .upsert_user_identity(&subject_id, &parsed, None)
            .await
            .expect("seed user");
        self.session_for(subject, email).await
    }

    /// Seeds a linked user with one recorded purchase, signs in, and
    /// returns the session cookie. The caller is fully entitled.
    pub async fn entitled_session(&self, subject: &str, email: &str) -> String {
        let subject_id = SubjectId::new(subject);
        let parsed = Email::parse(email).expect("valid email");

        let user = self
            .store
            .upsert_user_identity(&subject_id, &parsed, None)
            .await
            .expect("seed user");
        self.store
            .insert_purchase(NewPurchase {
                order_id: format!("order-{subject}"),
                user_id: Some(user.id),
                user_email: parsed,
                product_name: "Leadflow CRM".to_owned(),
                total_amount: 4900,
                currency: "USD".to_owned(),
                status: "paid".to_owned(),
                raw_payload: serde_json::json!({ "seeded_by": "test harness" }),
            })
            .await
            .expect("seed purchase");

        self.session_for(subject, email).await
    }

    /// Delivers a signed identity webhook with fresh svix headers.
    pub async fn post_identity_webhook(&self, body: &[u8]) -> Response<Body> {
        let id = "msg_test";
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_identity_payload(IDENTITY_WEBHOOK_SECRET, id, &timestamp, body);
        self.post_identity_webhook_raw(body, id, &timestamp, &signature)
            .await
    }

    /// Delivers an identity webhook with caller-supplied headers.
    pub async fn post_identity_webhook_raw(
        &self,
        body: &[u8],
        id: &str,
        timestamp: &str,
        signature: &str,
    ) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri("/api/webhooks/identity")
            .header(header::CONTENT_TYPE, "application/json")
            .header("svix-id", id)
            .header("svix-timestamp", timestamp)
            .header("svix-signature", signature)
            .body(Body::from(body.to_vec()))
            .expect("request");
        self.send(request).await
    }

    /// Delivers a payment webhook signed with the harness secret.
    pub async fn post_payment_webhook(&self, body: &[u8]) -> Response<Body> {
        let signature = sign_payment_payload(PAYMENT_WEBHOOK_SECRET, body);
        self.post_payment_webhook_raw(body, Some(&signature)).await
    }

    /// Delivers a payment webhook with a caller-supplied signature header.
    pub async fn post_payment_webhook_raw(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/webhooks/payments")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(signature) = signature {
            builder = builder.header("X-Signature", signature);
        }
        self.send(builder.body(Body::from(body.to_vec())).expect("request"))
            .await
    }
}

/// Extracts the session cookie pair from `Set-Cookie`, if one was issued.
#[must_use]
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::to_owned)
}

/// Reads the full response body as JSON.
///
/// # Panics
///
/// Panics if the body is not valid JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("JSON body")
}

/// Computes the svix-style signature header value for an identity delivery.
#[must_use]
pub fn sign_identity_payload(secret: &str, id: &str, timestamp: &str, body: &[u8]) -> String {
    let encoded_key = secret.strip_prefix("whsec_").unwrap_or(secret);
    let key = BASE64.decode(encoded_key).expect("decodable secret");

    let mut mac = HmacSha256::new_from_slice(&key).expect("hmac key");
    mac.update(id.as_bytes());
    mac.update(b".");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);

    format!("v1,{}", BASE64.encode(mac.finalize().into_bytes()))
}

/// Computes the hex signature header value for a payment delivery.
#[must_use]
pub fn sign_payment_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
