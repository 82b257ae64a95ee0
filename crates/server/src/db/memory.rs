//! In-memory [`Store`] for tests and local development.
//!
//! Mirrors the Postgres constraint behavior: unique email, unique subject
//! link, unique order id, link-only-when-unlinked, and all-or-nothing lead
//! conversion. Deleting a lead clears `lead_id` on clients that reference
//! it, matching the `ON DELETE SET NULL` foreign key.

use async_trait::async_trait;
use chrono::Utc;
use leadflow_core::{ClientId, Email, LeadId, PurchaseId, SubjectId, UserId};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{Store, StoreError};
use crate::models::{Client, Lead, NewClient, NewPurchase, Purchase, User};

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<UserId, User>,
    leads: HashMap<LeadId, Lead>,
    clients: HashMap<ClientId, Client>,
    purchases: HashMap<PurchaseId, Purchase>,
    fail_purchase_counts: bool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `count_purchases` fail, for exercising the
    /// degraded-entitlement path.
    pub async fn set_purchase_count_failure(&self, fail: bool) {
        self.inner.write().await.fail_purchase_counts = fail;
    }

    /// Number of clients owned by `user_id`.
    pub async fn client_count(&self, user_id: UserId) -> usize {
        self.inner
            .read()
            .await
            .clients
            .values()
            .filter(|c| c.user_id == user_id)
            .count()
    }

    /// Clients owned by `user_id`, in no particular order.
    pub async fn clients_for(&self, user_id: UserId) -> Vec<Client> {
        self.inner
            .read()
            .await
            .clients
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn user_by_subject(&self, subject: &SubjectId) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.external_subject_id.as_ref() == Some(subject))
            .cloned())
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| &u.email == email).cloned())
    }

    async fn link_subject(
        &self,
        user_id: UserId,
        subject: &SubjectId,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;

        let taken = inner.users.values().any(|u| {
            u.id != user_id && u.external_subject_id.as_ref() == Some(subject)
        });
        if taken {
            return Err(StoreError::Conflict(
                "subject is already linked to another user".to_owned(),
            ));
        }

        let Some(user) = inner.users.get_mut(&user_id) else {
            return Ok(false);
        };
        if user.external_subject_id.is_some() {
            return Ok(false);
        }
        user.external_subject_id = Some(subject.clone());
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn upsert_user_identity(
        &self,
        subject: &SubjectId,
        email: &Email,
        full_name: Option<String>,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;

        let existing = inner
            .users
            .values()
            .find(|u| u.external_subject_id.as_ref() == Some(subject))
            .map(|u| u.id);
        if let Some(id) = existing {
            let email_taken = inner
                .users
                .values()
                .any(|u| u.id != id && &u.email == email);
            if email_taken {
                return Err(StoreError::Conflict(
                    "email already belongs to another user".to_owned(),
                ));
            }
            let Some(user) = inner.users.get_mut(&id) else {
                return Err(StoreError::NotFound);
            };
            user.email = email.clone();
            user.full_name = full_name;
            user.updated_at = Utc::now();
            return Ok(user.clone());
        }

        if inner.users.values().any(|u| &u.email == email) {
            return Err(StoreError::Conflict(
                "email already belongs to another user".to_owned(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: UserId::generate(),
            external_subject_id: Some(subject.clone()),
            email: email.clone(),
            full_name,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn create_unlinked_user(
        &self,
        email: &Email,
        full_name: Option<String>,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;

        if inner.users.values().any(|u| &u.email == email) {
            return Err(StoreError::Conflict("email already exists".to_owned()));
        }

        let now = Utc::now();
        let user = User {
            id: UserId::generate(),
            external_subject_id: None,
            email: email.clone(),
            full_name,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn count_purchases(&self, user_id: UserId) -> Result<i64, StoreError> {
        let inner = self.inner.read().await;
        if inner.fail_purchase_counts {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        let count = inner
            .purchases
            .values()
            .filter(|p| p.user_id == Some(user_id))
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn insert_purchase(&self, purchase: NewPurchase) -> Result<Purchase, StoreError> {
        let mut inner = self.inner.write().await;

        if inner
            .purchases
            .values()
            .any(|p| p.order_id == purchase.order_id)
        {
            return Err(StoreError::Conflict(
                "order has already been recorded".to_owned(),
            ));
        }

        let stored = Purchase {
            id: PurchaseId::generate(),
            order_id: purchase.order_id,
            user_id: purchase.user_id,
            user_email: purchase.user_email,
            product_name: purchase.product_name,
            total_amount: purchase.total_amount,
            currency: purchase.currency,
            status: purchase.status,
            raw_payload: purchase.raw_payload,
            created_at: Utc::now(),
        };
        inner.purchases.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn insert_lead(&self, lead: &Lead) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.leads.insert(lead.id, lead.clone());
        Ok(())
    }

    async fn list_leads(&self, user_id: UserId) -> Result<Vec<Lead>, StoreError> {
        let inner = self.inner.read().await;
        let mut leads: Vec<Lead> = inner
            .leads
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(leads)
    }

    async fn lead_by_id(
        &self,
        user_id: UserId,
        lead_id: LeadId,
    ) -> Result<Option<Lead>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .leads
            .get(&lead_id)
            .filter(|l| l.user_id == user_id)
            .cloned())
    }

    async fn update_lead(&self, lead: &Lead) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.leads.get_mut(&lead.id) {
            Some(existing) if existing.user_id == lead.user_id => {
                *existing = lead.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn convert_lead(&self, lead: &Lead, client: NewClient) -> Result<Client, StoreError> {
        // One lock guards both writes, so the update and the insert land
        // together or not at all.
        let mut inner = self.inner.write().await;

        match inner.leads.get_mut(&lead.id) {
            Some(existing) if existing.user_id == lead.user_id => {
                *existing = lead.clone();
            }
            _ => return Err(StoreError::NotFound),
        }

        let now = Utc::now();
        let created = Client {
            id: ClientId::generate(),
            user_id: client.user_id,
            lead_id: Some(client.lead_id),
            name: client.name,
            company_name: client.company_name,
            email: client.email,
            phone: client.phone,
            notes: client.notes,
            status: Client::ACTIVE_STATUS.to_owned(),
            created_at: now,
            updated_at: now,
        };
        inner.clients.insert(created.id, created.clone());
        Ok(created)
    }

    async fn delete_lead(&self, user_id: UserId, lead_id: LeadId) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;

        let owned = inner
            .leads
            .get(&lead_id)
            .is_some_and(|l| l.user_id == user_id);
        if !owned {
            return Ok(false);
        }
        inner.leads.remove(&lead_id);

        for client in inner.clients.values_mut() {
            if client.lead_id == Some(lead_id) {
                client.lead_id = None;
            }
        }
        Ok(true)
    }
}
