use chrono::{DateTime, Utc};
use leadflow_core::{Email, PurchaseId, UserId};

/// A recorded payment event.
///
/// `order_id` is unique and makes webhook ingestion idempotent: a redelivered
/// event hits the constraint instead of creating a second row. `user_id` is
/// nullable so a purchase survives its user being deleted, and `user_email`
/// keeps the payer identity either way.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct Purchase {
    pub id: PurchaseId,
    pub order_id: String,
    pub user_id: Option<UserId>,
    pub user_email: Email,
    pub product_name: String,
    pub total_amount: i64,
    pub currency: String,
    pub status: String,
    pub raw_payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Insert shape for [`Purchase`]; the id and timestamp are assigned by the
/// store.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub order_id: String,
    pub user_id: Option<UserId>,
    pub user_email: Email,
    pub product_name: String,
    pub total_amount: i64,
    pub currency: String,
    pub status: String,
    pub raw_payload: serde_json::Value,
}
