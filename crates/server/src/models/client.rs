use chrono::{DateTime, Utc};
use leadflow_core::{ClientId, LeadId, UserId};

/// A converted lead.
///
/// `lead_id` records which lead the client came from and goes `None` if
/// that lead is later deleted.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct Client {
    pub id: ClientId,
    pub user_id: UserId,
    pub lead_id: Option<LeadId>,
    pub name: String,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// Status every client starts with at conversion.
    pub const ACTIVE_STATUS: &'static str = "Active";
}

/// Fields for the client row derived during a lead conversion. Contact
/// details are copied from the lead after the triggering update has been
/// merged in.
#[derive(Debug, Clone)]
pub struct NewClient {
    pub user_id: UserId,
    pub lead_id: LeadId,
    pub name: String,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}
