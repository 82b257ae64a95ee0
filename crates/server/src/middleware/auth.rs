//! Authentication extractors.
//!
//! Handlers that need a signed-in caller take [`RequireIdentity`]; the
//! extractor reads the verified subject out of the session and rejects the
//! request when there is none.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::error::ErrorBody;
use crate::middleware::access::SIGN_IN_PATH;
use crate::models::{CurrentIdentity, session_keys};

/// Extractor that requires a signed-in identity.
///
/// API requests get `401 {"error": "Unauthorized"}`; everything else is
/// redirected to the sign-in page.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireIdentity(identity): RequireIdentity,
/// ) -> impl IntoResponse {
///     format!("subject: {}", identity.subject_id)
/// }
/// ```
pub struct RequireIdentity(pub CurrentIdentity);

/// Error returned when authentication is required but absent.
pub enum IdentityRejection {
    /// Redirect to the sign-in page (for HTML requests).
    RedirectToSignIn,
    /// Unauthorized response (for API requests).
    Unauthorized,
}

impl IntoResponse for IdentityRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToSignIn => Redirect::to(SIGN_IN_PATH).into_response(),
            Self::Unauthorized => {
                (StatusCode::UNAUTHORIZED, Json(ErrorBody::new("Unauthorized"))).into_response()
            }
        }
    }
}

impl<S> FromRequestParts<S> for RequireIdentity
where
    S: Send + Sync,
{
    type Rejection = IdentityRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(IdentityRejection::Unauthorized)?;

        // Get the verified identity from the session
        let identity: CurrentIdentity = session
            .get(session_keys::CURRENT_IDENTITY)
            .await
            .ok()
            .flatten()
            .ok_or_else(|| {
                let is_api = parts.uri.path().starts_with("/api/");
                if is_api {
                    IdentityRejection::Unauthorized
                } else {
                    IdentityRejection::RedirectToSignIn
                }
            })?;

        Ok(Self(identity))
    }
}

/// Helper to set the current identity in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_identity(
    session: &Session,
    identity: &CurrentIdentity,
) -> Result<(), tower_sessions::session::Error> {
    session
        .insert(session_keys::CURRENT_IDENTITY, identity)
        .await
}

/// Helper to clear the current identity from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_identity(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentIdentity>(session_keys::CURRENT_IDENTITY)
        .await?;
    Ok(())
}
