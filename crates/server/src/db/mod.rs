//! Persistence layer.
//!
//! All reads and writes go through the [`Store`] trait so request handlers
//! and services stay independent of the backing engine. [`postgres::PgStore`]
//! is the production implementation; [`memory::MemoryStore`] backs tests and
//! local development.

use async_trait::async_trait;
use leadflow_core::{Email, LeadId, SubjectId, UserId};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Client, Lead, NewClient, NewPurchase, Purchase, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors surfaced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A row exists but cannot be mapped into its domain type.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    #[error("record not found")]
    NotFound,

    /// A uniqueness constraint rejected the write. Call sites know which
    /// constraint applies to them: a duplicate order id here is benign,
    /// a duplicate subject link is a conflict.
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Backing storage for users, leads, clients and purchases.
#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap connectivity probe for readiness checks.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn user_by_subject(&self, subject: &SubjectId) -> Result<Option<User>, StoreError>;

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError>;

    /// Links `subject` to the user iff the row is still unlinked.
    ///
    /// Returns `Ok(false)` without writing when the row is already linked
    /// (or gone), so concurrent sign-ins cannot overwrite an existing link.
    async fn link_subject(&self, user_id: UserId, subject: &SubjectId)
    -> Result<bool, StoreError>;

    /// Creates or updates the user owning `subject`, keyed on the subject id.
    async fn upsert_user_identity(
        &self,
        subject: &SubjectId,
        email: &Email,
        full_name: Option<String>,
    ) -> Result<User, StoreError>;

    /// Creates a user with no linked subject, as payment ingestion does for
    /// payers who have never signed in.
    async fn create_unlinked_user(
        &self,
        email: &Email,
        full_name: Option<String>,
    ) -> Result<User, StoreError>;

    async fn count_purchases(&self, user_id: UserId) -> Result<i64, StoreError>;

    /// Inserts a purchase; a duplicate `order_id` comes back as
    /// [`StoreError::Conflict`].
    async fn insert_purchase(&self, purchase: NewPurchase) -> Result<Purchase, StoreError>;

    async fn insert_lead(&self, lead: &Lead) -> Result<(), StoreError>;

    /// Leads owned by `user_id`, newest first.
    async fn list_leads(&self, user_id: UserId) -> Result<Vec<Lead>, StoreError>;

    async fn lead_by_id(&self, user_id: UserId, lead_id: LeadId)
    -> Result<Option<Lead>, StoreError>;

    /// Writes the full lead row, scoped to its owner. `Ok(false)` means no
    /// matching row.
    async fn update_lead(&self, lead: &Lead) -> Result<bool, StoreError>;

    /// Applies a conversion atomically: persists the updated lead and inserts
    /// the derived client in one transaction. Fails with
    /// [`StoreError::NotFound`] (and writes nothing) when the lead is gone.
    async fn convert_lead(&self, lead: &Lead, client: NewClient) -> Result<Client, StoreError>;

    /// Hard-deletes a lead. `Ok(false)` means no matching row.
    async fn delete_lead(&self, user_id: UserId, lead_id: LeadId) -> Result<bool, StoreError>;
}

/// Creates a `PgPool` sized for the service.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
