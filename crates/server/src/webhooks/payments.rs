//! Payment provider webhook: signed order and subscription events.
//!
//! Deliveries carry a single `X-Signature` header: lowercase hex
//! HMAC-SHA256 over the raw body with the shared secret used directly as
//! the key. Only order / renewal payments become purchases; every other
//! recognized delivery is acknowledged and dropped so the provider does
//! not retry it.

use hmac::Mac;
use leadflow_core::Email;
use serde::Deserialize;
use thiserror::Error;

use super::HmacSha256;
use crate::db::{Store, StoreError};
use crate::models::{NewPurchase, Purchase};

pub const SIGNATURE_HEADER: &str = "X-Signature";

pub const ORDER_CREATED: &str = "order_created";
pub const SUBSCRIPTION_PAYMENT_SUCCESS: &str = "subscription_payment_success";

/// Placeholder stored when an event names no product.
pub const UNKNOWN_PRODUCT: &str = "N/A";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header is not valid hex")]
    MalformedSignature,

    #[error("signature mismatch")]
    Mismatch,
}

/// Verifies the `X-Signature` digest over the raw body.
pub fn verify_signature(
    secret: &str,
    body: &[u8],
    signature_hex: &str,
) -> Result<(), SignatureError> {
    let signature =
        hex::decode(signature_hex).map_err(|_| SignatureError::MalformedSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::Mismatch)?;
    mac.update(body);
    // verify_slice compares in constant time.
    mac.verify_slice(&signature)
        .map_err(|_| SignatureError::Mismatch)
}

/// Whether an event type should produce a purchase row.
#[must_use]
pub fn is_actionable(event_name: &str) -> bool {
    event_name == ORDER_CREATED || event_name == SUBSCRIPTION_PAYMENT_SUCCESS
}

/// Payment event envelope, post-verification.
#[derive(Debug, Deserialize)]
pub struct PaymentEvent {
    pub meta: EventMeta,
    pub data: EventObject,
}

#[derive(Debug, Deserialize)]
pub struct EventMeta {
    pub event_name: String,
}

#[derive(Debug, Deserialize)]
pub struct EventObject {
    pub id: String,
    pub attributes: OrderAttributes,
}

#[derive(Debug, Deserialize)]
pub struct OrderAttributes {
    #[serde(default)]
    pub order_number: Option<u64>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Amount in the currency's minor unit.
    #[serde(default)]
    pub total: Option<i64>,
    #[serde(default)]
    pub first_order_item: Option<OrderItem>,
}

#[derive(Debug, Deserialize)]
pub struct OrderItem {
    #[serde(default)]
    pub product_name: Option<String>,
}

pub fn parse_event(body: &[u8]) -> Result<PaymentEvent, serde_json::Error> {
    serde_json::from_slice(body)
}

/// Outcome of folding one delivery into the store. Every variant is an
/// acknowledgement; redeliveries and incomplete payloads must not make the
/// provider retry.
#[derive(Debug)]
pub enum PaymentIngest {
    Recorded(Purchase),
    /// The order id already exists; a redelivered event.
    Duplicate { order_id: String },
    /// Actionable event with no usable payer email; logged and dropped.
    MissingPayerEmail,
    /// An event type this service does not act on.
    Ignored,
}

/// Records an authenticated payment event.
///
/// The payer is matched to a user by email; unknown payers get an unlinked
/// user row so the purchase counts for them once they sign in.
pub async fn ingest(
    store: &dyn Store,
    event: PaymentEvent,
    raw_payload: serde_json::Value,
) -> Result<PaymentIngest, StoreError> {
    if !is_actionable(&event.meta.event_name) {
        return Ok(PaymentIngest::Ignored);
    }

    let attributes = event.data.attributes;
    let Some(email) = attributes
        .user_email
        .as_deref()
        .and_then(|raw| raw.parse::<Email>().ok())
    else {
        return Ok(PaymentIngest::MissingPayerEmail);
    };

    let user = match store.user_by_email(&email).await? {
        Some(user) => user,
        None => {
            match store
                .create_unlinked_user(&email, attributes.user_name.clone())
                .await
            {
                Ok(user) => user,
                // Lost a creation race; the row exists now.
                Err(StoreError::Conflict(_)) => store
                    .user_by_email(&email)
                    .await?
                    .ok_or(StoreError::NotFound)?,
                Err(e) => return Err(e),
            }
        }
    };

    let order_id = attributes
        .order_number
        .map(|n| n.to_string())
        .unwrap_or_else(|| event.data.id.clone());

    let purchase = NewPurchase {
        order_id: order_id.clone(),
        user_id: Some(user.id),
        user_email: email,
        product_name: attributes
            .first_order_item
            .and_then(|item| item.product_name)
            .unwrap_or_else(|| UNKNOWN_PRODUCT.to_owned()),
        total_amount: attributes.total.unwrap_or(0),
        currency: attributes.currency.unwrap_or_default(),
        status: attributes.status.unwrap_or_default(),
        raw_payload,
    };

    match store.insert_purchase(purchase).await {
        Ok(recorded) => Ok(PaymentIngest::Recorded(recorded)),
        Err(StoreError::Conflict(_)) => Ok(PaymentIngest::Duplicate { order_id }),
        Err(e) => Err(e),
    }
}
