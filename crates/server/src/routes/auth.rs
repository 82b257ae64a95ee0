//! Session establishment and teardown.
//!
//! The identity provider authenticates the user in the browser. The
//! front-end then posts the provider's session token here; we verify it
//! server-side and bind the subject to a first-party cookie session.

use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, AppJson, Result, clear_sentry_user, set_sentry_user};
use crate::identity::IdentityError;
use crate::middleware::{clear_current_identity, set_current_identity};
use crate::models::CurrentIdentity;
use crate::state::AppState;

/// Request body for session creation.
#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    /// Session token minted by the identity provider's front-end SDK.
    pub token: String,
}

/// Verify a provider session token and establish a session.
///
/// # Errors
///
/// Returns 401 if the provider rejects the token, 500 if the provider
/// cannot be reached.
#[instrument(skip_all)]
pub async fn create_session(
    State(state): State<AppState>,
    session: Session,
    AppJson(body): AppJson<SessionRequest>,
) -> Result<StatusCode> {
    let subject_id = match state.identity().verify_session_token(&body.token).await {
        Ok(subject_id) => subject_id,
        Err(IdentityError::TokenRejected) => {
            tracing::warn!("session token rejected by identity provider");
            return Err(AppError::Unauthorized("Invalid session token".to_owned()));
        }
        Err(err) => return Err(err.into()),
    };

    let identity = CurrentIdentity { subject_id };
    set_current_identity(&session, &identity).await?;
    set_sentry_user(&identity.subject_id, None);
    tracing::info!(subject = %identity.subject_id, "session established");

    Ok(StatusCode::NO_CONTENT)
}

/// Destroy the current session.
#[instrument(skip_all)]
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_identity(&session).await?;
    session.flush().await?;
    clear_sentry_user();

    Ok(StatusCode::NO_CONTENT)
}
