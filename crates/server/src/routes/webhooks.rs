//! Webhook receivers.
//!
//! Signatures are computed over the exact bytes delivered, so both
//! handlers take the raw body and parse JSON only after verification.
//! Responses follow the providers' retry contracts: 2xx acknowledges, 4xx
//! rejects without retry for garbage we will never accept, 5xx asks the
//! provider to redeliver later.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use secrecy::ExposeSecret;
use tracing::instrument;

use crate::error::ErrorBody;
use crate::state::AppState;
use crate::webhooks::identity::{
    self as identity_events, EnvelopeError, EnvelopeHeaders, IdentityIngest, IngestError,
};
use crate::webhooks::payments::{self as payment_events, PaymentIngest};

/// Receive an identity provider user lifecycle event.
#[instrument(skip_all)]
pub async fn identity_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(secret) = state.config().identity.webhook_secret.as_ref() else {
        tracing::error!("IDENTITY_WEBHOOK_SECRET is not set; rejecting delivery");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Webhook secret not configured",
        );
    };

    let (Some(id), Some(timestamp), Some(signature)) = (
        header_str(&headers, identity_events::ID_HEADER),
        header_str(&headers, identity_events::TIMESTAMP_HEADER),
        header_str(&headers, identity_events::SIGNATURE_HEADER),
    ) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing webhook headers");
    };

    let envelope = EnvelopeHeaders {
        id,
        timestamp,
        signature,
    };
    if let Err(err) =
        identity_events::verify_envelope(secret.expose_secret(), &body, &envelope, Utc::now())
    {
        return match err {
            EnvelopeError::MalformedSecret => {
                tracing::error!("IDENTITY_WEBHOOK_SECRET does not decode; rejecting delivery");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Webhook secret not configured",
                )
            }
            EnvelopeError::SignatureMismatch => {
                tracing::warn!(delivery = %id, "identity webhook signature mismatch");
                error_response(StatusCode::UNAUTHORIZED, "Invalid signature")
            }
            EnvelopeError::MalformedTimestamp | EnvelopeError::StaleTimestamp => {
                tracing::warn!(delivery = %id, error = %err, "identity webhook timestamp rejected");
                error_response(StatusCode::BAD_REQUEST, "Invalid timestamp")
            }
        };
    }

    let event = match identity_events::parse_event(&body) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(delivery = %id, error = %err, "identity webhook body is not a valid event");
            return error_response(StatusCode::BAD_REQUEST, "Invalid payload");
        }
    };

    match identity_events::ingest(state.store(), &event).await {
        Ok(IdentityIngest::Synced(user)) => {
            tracing::info!(
                delivery = %id,
                event = %event.event_type,
                user_id = %user.id,
                "identity event processed"
            );
            message_response(StatusCode::OK, "Webhook processed")
        }
        Ok(IdentityIngest::Ignored) => {
            tracing::debug!(delivery = %id, event = %event.event_type, "identity event ignored");
            message_response(StatusCode::OK, "Webhook received")
        }
        Err(IngestError::MissingEmail) => {
            tracing::warn!(delivery = %id, "identity event has no email address");
            error_response(StatusCode::BAD_REQUEST, "Email is required")
        }
        Err(IngestError::Store(err)) => {
            tracing::error!(delivery = %id, error = %err, "identity event failed to persist");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

/// Receive a payment provider order event.
#[instrument(skip_all)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(secret) = state.config().payment.webhook_secret.as_ref() else {
        tracing::error!("PAYMENT_WEBHOOK_SECRET is not set; rejecting delivery");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Webhook secret not configured",
        );
    };

    let Some(signature) = header_str(&headers, payment_events::SIGNATURE_HEADER) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing signature header");
    };

    if let Err(err) = payment_events::verify_signature(secret.expose_secret(), &body, signature) {
        tracing::warn!(error = %err, "payment webhook signature rejected");
        return error_response(StatusCode::UNAUTHORIZED, "Invalid signature");
    }

    // The raw payload is stored alongside the parsed fields, so the body is
    // decoded twice: once typed, once as a value.
    let event = match payment_events::parse_event(&body) {
        Ok(event) => event,
        Err(err) => {
            tracing::warn!(error = %err, "payment webhook body is not a valid event");
            return error_response(StatusCode::BAD_REQUEST, "Invalid payload");
        }
    };
    let raw_payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, "payment webhook body is not valid JSON");
            return error_response(StatusCode::BAD_REQUEST, "Invalid payload");
        }
    };

    let event_name = event.meta.event_name.clone();
    match payment_events::ingest(state.store(), event, raw_payload).await {
        Ok(PaymentIngest::Recorded(purchase)) => {
            tracing::info!(
                event = %event_name,
                order_id = %purchase.order_id,
                "purchase recorded"
            );
            message_response(StatusCode::OK, "Webhook received")
        }
        Ok(PaymentIngest::Duplicate { order_id }) => {
            tracing::info!(event = %event_name, %order_id, "duplicate delivery acknowledged");
            message_response(StatusCode::OK, "Webhook received")
        }
        Ok(PaymentIngest::MissingPayerEmail) => {
            tracing::warn!(event = %event_name, "payment event has no payer email; dropped");
            message_response(StatusCode::OK, "Webhook received")
        }
        Ok(PaymentIngest::Ignored) => {
            tracing::debug!(event = %event_name, "payment event ignored");
            message_response(StatusCode::OK, "Webhook received")
        }
        Err(err) => {
            tracing::error!(event = %event_name, error = %err, "payment event failed to persist");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}

fn message_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "message": message }))).into_response()
}
