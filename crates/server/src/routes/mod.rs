//! HTTP route handlers for the CRM service.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Landing page shell
//! GET  /sign-in                - Sign-in shell (provider renders the form)
//! GET  /sign-up                - Sign-up shell
//! GET  /dashboard              - Dashboard shell (paywalled by the access gate)
//! GET  /health                 - Health check
//! GET  /health/ready           - Readiness check (store connectivity)
//!
//! # Auth
//! POST /auth/session           - Exchange a provider session token for a session cookie
//! POST /auth/logout            - Destroy the session
//!
//! # Leads API (requires session)
//! GET    /api/leads            - List the caller's leads, newest first
//! POST   /api/leads            - Create a lead
//! PATCH  /api/leads/{id}       - Partially update a lead (may convert it)
//! DELETE /api/leads/{id}       - Delete a lead
//!
//! # Webhooks (signature-authenticated, no session)
//! POST /api/webhooks/identity  - Identity provider user lifecycle events
//! POST /api/webhooks/payments  - Payment provider order events
//! ```

pub mod auth;
pub mod leads;
pub mod pages;
pub mod webhooks;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/session", post(auth::create_session))
        .route("/logout", post(auth::logout))
}

/// Create the leads API router.
pub fn lead_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(leads::list).post(leads::create))
        .route("/{id}", patch(leads::update).delete(leads::remove))
}

/// Create the webhook routes router.
pub fn webhook_routes() -> Router<AppState> {
    Router::new()
        .route("/identity", post(webhooks::identity_webhook))
        .route("/payments", post(webhooks::payment_webhook))
}

/// Create all routes for the service.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Page shells
        .route("/", get(pages::landing))
        .route("/sign-in", get(pages::sign_in))
        .route("/sign-up", get(pages::sign_up))
        .route("/dashboard", get(pages::dashboard))
        // Auth routes
        .nest("/auth", auth_routes())
        // Leads API
        .nest("/api/leads", lead_routes())
        // Webhooks
        .nest("/api/webhooks", webhook_routes())
}
