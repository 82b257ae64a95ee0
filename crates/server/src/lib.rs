//! Leadflow CRM server library.
//!
//! A lightweight CRM backend: users authenticate with a hosted identity
//! provider, purchases arrive over payment provider webhooks, and a
//! paywalled dashboard manages each user's sales leads. The binary in
//! `main.rs` wires this library to Postgres and the real provider; tests
//! drive the same router against in-memory implementations.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod webhooks;

use axum::{Router, extract::State, http::StatusCode, routing::get};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
///
/// The session layer is applied by the caller, outside this router, so the
/// binary can use the Postgres-backed session store while tests swap in an
/// in-memory one. The access gate assumes it is mounted inside that layer.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::access_gate,
        ))
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies store connectivity before returning OK.
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> Result<&'static str, StatusCode> {
    match state.store().ping().await {
        Ok(()) => Ok("ready"),
        Err(err) => {
            tracing::error!(error = %err, "Readiness check failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
