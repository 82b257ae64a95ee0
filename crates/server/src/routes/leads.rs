//! Lead CRUD handlers.
//!
//! Every endpoint requires a session. Listing is additionally entitlement
//! checked; mutations only need the caller resolved to a user, so a lapsed
//! customer can still work the pipeline they already own.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use leadflow_core::{LeadId, UserId};
use serde::Serialize;
use tracing::instrument;

use crate::error::{AppError, AppJson, Result};
use crate::middleware::RequireIdentity;
use crate::models::{Client, CurrentIdentity, Lead, LeadUpdate, NewLead};
use crate::services::{
    AccessDecision, AccessService, DenyReason, LeadService, ResolveError, UpdateOutcome,
};
use crate::state::AppState;

/// Response body when an update converts the lead into a client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResponse {
    pub message: String,
    pub updated_lead: Lead,
    pub new_client: Client,
}

/// Plain message response body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

const USER_NOT_FOUND: &str = "User not found";

/// List the caller's leads, newest first.
///
/// # Errors
///
/// Returns 404 if the caller cannot be resolved to a user, 403 if they
/// have no recorded purchase.
#[instrument(skip_all)]
pub async fn list(
    State(state): State<AppState>,
    RequireIdentity(identity): RequireIdentity,
) -> Result<Json<Vec<Lead>>> {
    let access = AccessService::new(state.store(), state.identity());
    let user_id = match access.authorize(&identity.subject_id).await {
        AccessDecision::Entitled { user_id } => user_id,
        AccessDecision::Unentitled { .. } => {
            return Err(AppError::Forbidden("No purchase found".to_owned()));
        }
        AccessDecision::Unresolved(DenyReason::StoreUnavailable) => {
            return Err(AppError::Internal("store unavailable".to_owned()));
        }
        AccessDecision::Unresolved(_) => {
            return Err(AppError::NotFound(USER_NOT_FOUND.to_owned()));
        }
    };

    let leads = LeadService::new(state.store()).list(user_id).await?;

    Ok(Json(leads))
}

/// Create a lead owned by the caller.
///
/// # Errors
///
/// Returns 400 if the name is missing or empty, 404 if the caller cannot
/// be resolved to a user.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    RequireIdentity(identity): RequireIdentity,
    AppJson(fields): AppJson<NewLead>,
) -> Result<(StatusCode, Json<Lead>)> {
    let user_id = resolve_caller(&state, &identity).await?;

    let lead = LeadService::new(state.store()).create(user_id, fields).await?;

    tracing::info!(lead_id = %lead.id, "lead created");
    Ok((StatusCode::CREATED, Json(lead)))
}

/// Partially update one of the caller's leads.
///
/// Moving the status into `Converted` additionally derives a client; that
/// variant returns both records.
///
/// # Errors
///
/// Returns 400 for an empty patch, 404 if the lead does not exist or
/// belongs to someone else.
#[instrument(skip(state, identity, update), fields(lead_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    RequireIdentity(identity): RequireIdentity,
    Path(id): Path<LeadId>,
    AppJson(update): AppJson<LeadUpdate>,
) -> Result<Response> {
    let user_id = resolve_caller(&state, &identity).await?;

    let outcome = LeadService::new(state.store())
        .update(user_id, id, update)
        .await?;

    Ok(match outcome {
        UpdateOutcome::Updated(lead) => Json(lead).into_response(),
        UpdateOutcome::Converted { lead, client } => {
            tracing::info!(lead_id = %lead.id, client_id = %client.id, "lead converted to client");
            Json(ConversionResponse {
                message: "Lead converted to client successfully.".to_owned(),
                updated_lead: lead,
                new_client: client,
            })
            .into_response()
        }
    })
}

/// Delete one of the caller's leads.
///
/// # Errors
///
/// Returns 404 if the lead does not exist or belongs to someone else.
#[instrument(skip(state, identity), fields(lead_id = %id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireIdentity(identity): RequireIdentity,
    Path(id): Path<LeadId>,
) -> Result<Json<MessageResponse>> {
    let user_id = resolve_caller(&state, &identity).await?;

    LeadService::new(state.store()).delete(user_id, id).await?;

    tracing::info!(lead_id = %id, "lead deleted");
    Ok(Json(MessageResponse {
        message: "Lead deleted successfully".to_owned(),
    }))
}

/// Resolve the session subject to a user id, without the entitlement check.
async fn resolve_caller(state: &AppState, identity: &CurrentIdentity) -> Result<UserId> {
    AccessService::new(state.store(), state.identity())
        .resolve(&identity.subject_id)
        .await
        .map_err(|err| match err {
            // A caller we cannot pin to a user gets the same answer as a
            // missing record; the reason is already logged at resolution.
            ResolveError::UnknownUser
            | ResolveError::LinkConflict
            | ResolveError::IdentityLookupFailed => AppError::NotFound(USER_NOT_FOUND.to_owned()),
            ResolveError::Store(e) => AppError::Store(e),
        })
}
