//! Entitlement-aware access gate for protected pages.
//!
//! The gate classifies each request path. Public paths pass untouched.
//! Protected pages consult the session: a signed-in subject is resolved and
//! checked for a purchase, and the response is a redirect when the dashboard
//! is off limits. Requests without a session pass through so the identity
//! provider's own client-side sign-in flow can take over.
//!
//! Protected API paths are classified here but answered in their handlers,
//! which own the JSON error taxonomy; a gate-issued redirect is useless to a
//! fetch call.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentIdentity, session_keys};
use crate::services::{AccessDecision, AccessService};
use crate::state::AppState;

/// Where unresolvable sessions are sent.
pub const SIGN_IN_PATH: &str = "/sign-in";

/// Where unentitled users land when turned away from the dashboard.
pub const LANDING_PATH: &str = "/";

const DASHBOARD_PREFIX: &str = "/dashboard";

/// Paths that never require a session.
const PUBLIC_PREFIXES: &[&str] = &["/sign-in", "/sign-up", "/auth", "/api/webhooks", "/health"];

/// Paths behind the purchase check.
const PROTECTED_PREFIXES: &[&str] = &["/dashboard", "/api/leads"];

/// Prefix match on whole path segments: `/dashboard` covers `/dashboard`
/// and `/dashboard/settings` but not `/dashboards`.
fn path_has_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[must_use]
pub fn is_public_path(path: &str) -> bool {
    path == "/" || PUBLIC_PREFIXES.iter().any(|p| path_has_prefix(path, p))
}

#[must_use]
pub fn is_protected_path(path: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|p| path_has_prefix(path, p))
}

/// Gate middleware; mounted inside the session layer.
pub async fn access_gate(
    State(state): State<AppState>,
    session: Session,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    let gated = !is_public_path(path) && is_protected_path(path);
    let is_api = path.starts_with("/api/");
    let on_dashboard = path_has_prefix(path, DASHBOARD_PREFIX);

    if !gated || is_api {
        return next.run(request).await;
    }

    let identity: Option<CurrentIdentity> = session
        .get(session_keys::CURRENT_IDENTITY)
        .await
        .ok()
        .flatten();
    let Some(identity) = identity else {
        // No session: let the page shell render and hand off to the
        // provider's sign-in flow.
        return next.run(request).await;
    };

    let access = AccessService::new(state.store(), state.identity());
    match access.authorize(&identity.subject_id).await {
        AccessDecision::Entitled { .. } => next.run(request).await,
        AccessDecision::Unentitled { user_id } => {
            if on_dashboard {
                tracing::debug!(%user_id, "no purchase on file; turning away from the dashboard");
                Redirect::to(LANDING_PATH).into_response()
            } else {
                next.run(request).await
            }
        }
        AccessDecision::Unresolved(reason) => {
            tracing::debug!(
                subject = %identity.subject_id,
                ?reason,
                "session subject did not resolve; sending to sign-in"
            );
            Redirect::to(SIGN_IN_PATH).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_paths_are_recognized() {
        for path in [
            "/",
            "/sign-in",
            "/sign-in/sso-callback",
            "/sign-up",
            "/auth/session",
            "/api/webhooks/identity",
            "/api/webhooks/payments",
            "/health",
            "/health/ready",
        ] {
            assert!(is_public_path(path), "{path} should be public");
        }

        assert!(!is_public_path("/dashboard"));
        assert!(!is_public_path("/api/leads"));
    }

    #[test]
    fn protected_paths_are_recognized() {
        for path in [
            "/dashboard",
            "/dashboard/settings",
            "/api/leads",
            "/api/leads/0b2f4c1e",
        ] {
            assert!(is_protected_path(path), "{path} should be protected");
        }

        assert!(!is_protected_path("/"));
        assert!(!is_protected_path("/pricing"));
        assert!(!is_protected_path("/api/webhooks/payments"));
    }

    #[test]
    fn prefixes_match_whole_segments_only() {
        assert!(!is_protected_path("/dashboards"));
        assert!(!is_protected_path("/api/leadsheets"));
        assert!(!is_public_path("/sign-input"));
    }
}
