//! Postgres-backed [`Store`].
//!
//! Queries use the runtime sqlx API with [`sqlx::FromRow`] row types, so the
//! crate builds without a live database. Uniqueness violations are translated
//! into [`StoreError::Conflict`] here; deciding whether a conflict is benign
//! (a replayed order) or an error (a link race) is the caller's job.

use async_trait::async_trait;
use leadflow_core::{ClientId, Email, LeadId, PurchaseId, SubjectId, UserId};
use sqlx::PgPool;

use super::{Store, StoreError};
use crate::models::{Client, Lead, NewClient, NewPurchase, Purchase, User};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a uniqueness violation to [`StoreError::Conflict`]; everything else
/// stays a database error.
fn conflict_on_unique(err: sqlx::Error, message: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(message.to_owned());
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn user_by_subject(&self, subject: &SubjectId) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, external_subject_id, email, full_name, created_at, updated_at
             FROM users
             WHERE external_subject_id = $1",
        )
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, external_subject_id, email, full_name, created_at, updated_at
             FROM users
             WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn link_subject(
        &self,
        user_id: UserId,
        subject: &SubjectId,
    ) -> Result<bool, StoreError> {
        // The IS NULL guard is the compare-and-set: a row another request
        // already linked matches zero rows instead of being overwritten.
        let result = sqlx::query(
            "UPDATE users
             SET external_subject_id = $2, updated_at = now()
             WHERE id = $1 AND external_subject_id IS NULL",
        )
        .bind(user_id)
        .bind(subject)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "subject is already linked to another user"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_user_identity(
        &self,
        subject: &SubjectId,
        email: &Email,
        full_name: Option<String>,
    ) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, external_subject_id, email, full_name)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (external_subject_id) DO UPDATE
             SET email = EXCLUDED.email,
                 full_name = EXCLUDED.full_name,
                 updated_at = now()
             RETURNING id, external_subject_id, email, full_name, created_at, updated_at",
        )
        .bind(UserId::generate())
        .bind(subject)
        .bind(email)
        .bind(full_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email already belongs to another user"))?;
        Ok(user)
    }

    async fn create_unlinked_user(
        &self,
        email: &Email,
        full_name: Option<String>,
    ) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email, full_name)
             VALUES ($1, $2, $3)
             RETURNING id, external_subject_id, email, full_name, created_at, updated_at",
        )
        .bind(UserId::generate())
        .bind(email)
        .bind(full_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email already exists"))?;
        Ok(user)
    }

    async fn count_purchases(&self, user_id: UserId) -> Result<i64, StoreError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM purchases WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn insert_purchase(&self, purchase: NewPurchase) -> Result<Purchase, StoreError> {
        let purchase = sqlx::query_as::<_, Purchase>(
            "INSERT INTO purchases
                 (id, order_id, user_id, user_email, product_name,
                  total_amount, currency, status, raw_payload)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING id, order_id, user_id, user_email, product_name,
                       total_amount, currency, status, raw_payload, created_at",
        )
        .bind(PurchaseId::generate())
        .bind(&purchase.order_id)
        .bind(purchase.user_id)
        .bind(&purchase.user_email)
        .bind(&purchase.product_name)
        .bind(purchase.total_amount)
        .bind(&purchase.currency)
        .bind(&purchase.status)
        .bind(&purchase.raw_payload)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "order has already been recorded"))?;
        Ok(purchase)
    }

    async fn insert_lead(&self, lead: &Lead) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO leads
                 (id, user_id, name, company_name, email, phone, status,
                  source, notes, last_contacted_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(lead.id)
        .bind(lead.user_id)
        .bind(&lead.name)
        .bind(&lead.company_name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(lead.status)
        .bind(&lead.source)
        .bind(&lead.notes)
        .bind(lead.last_contacted_at)
        .bind(lead.created_at)
        .bind(lead.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_leads(&self, user_id: UserId) -> Result<Vec<Lead>, StoreError> {
        let leads = sqlx::query_as::<_, Lead>(
            "SELECT id, user_id, name, company_name, email, phone, status,
                    source, notes, last_contacted_at, created_at, updated_at
             FROM leads
             WHERE user_id = $1
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(leads)
    }

    async fn lead_by_id(
        &self,
        user_id: UserId,
        lead_id: LeadId,
    ) -> Result<Option<Lead>, StoreError> {
        let lead = sqlx::query_as::<_, Lead>(
            "SELECT id, user_id, name, company_name, email, phone, status,
                    source, notes, last_contacted_at, created_at, updated_at
             FROM leads
             WHERE id = $1 AND user_id = $2",
        )
        .bind(lead_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(lead)
    }

    async fn update_lead(&self, lead: &Lead) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE leads
             SET name = $3, company_name = $4, email = $5, phone = $6,
                 status = $7, source = $8, notes = $9, last_contacted_at = $10,
                 updated_at = $11
             WHERE id = $1 AND user_id = $2",
        )
        .bind(lead.id)
        .bind(lead.user_id)
        .bind(&lead.name)
        .bind(&lead.company_name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(lead.status)
        .bind(&lead.source)
        .bind(&lead.notes)
        .bind(lead.last_contacted_at)
        .bind(lead.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn convert_lead(&self, lead: &Lead, client: NewClient) -> Result<Client, StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE leads
             SET name = $3, company_name = $4, email = $5, phone = $6,
                 status = $7, source = $8, notes = $9, last_contacted_at = $10,
                 updated_at = $11
             WHERE id = $1 AND user_id = $2",
        )
        .bind(lead.id)
        .bind(lead.user_id)
        .bind(&lead.name)
        .bind(&lead.company_name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(lead.status)
        .bind(&lead.source)
        .bind(&lead.notes)
        .bind(lead.last_contacted_at)
        .bind(lead.updated_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // Dropping the open transaction rolls it back.
            return Err(StoreError::NotFound);
        }

        let created = sqlx::query_as::<_, Client>(
            "INSERT INTO clients
                 (id, user_id, lead_id, name, company_name, email, phone,
                  notes, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING id, user_id, lead_id, name, company_name, email, phone,
                       notes, status, created_at, updated_at",
        )
        .bind(ClientId::generate())
        .bind(client.user_id)
        .bind(client.lead_id)
        .bind(&client.name)
        .bind(&client.company_name)
        .bind(&client.email)
        .bind(&client.phone)
        .bind(&client.notes)
        .bind(Client::ACTIVE_STATUS)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn delete_lead(&self, user_id: UserId, lead_id: LeadId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM leads WHERE id = $1 AND user_id = $2")
            .bind(lead_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
