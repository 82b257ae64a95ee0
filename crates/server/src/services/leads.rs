//! Lead lifecycle: create, list, partial update, conversion, delete.
//!
//! Every operation is scoped to the owning user; a lead belonging to
//! someone else is indistinguishable from one that does not exist.

use chrono::Utc;
use leadflow_core::{LeadId, LeadStatus, UserId};
use thiserror::Error;

use crate::db::{Store, StoreError};
use crate::models::{Client, Lead, LeadUpdate, NewClient, NewLead};

#[derive(Debug, Error)]
pub enum LeadError {
    #[error("lead name is required")]
    NameRequired,

    #[error("no fields to update provided")]
    NoFieldsProvided,

    #[error("lead not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a partial update.
#[derive(Debug)]
pub enum UpdateOutcome {
    Updated(Lead),
    /// The update moved the lead into `Converted`, deriving a client.
    Converted { lead: Lead, client: Client },
}

pub struct LeadService<'a> {
    store: &'a dyn Store,
}

impl<'a> LeadService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn create(&self, owner_id: UserId, fields: NewLead) -> Result<Lead, LeadError> {
        let name = fields.name.unwrap_or_default();
        if name.is_empty() {
            return Err(LeadError::NameRequired);
        }

        let now = Utc::now();
        let lead = Lead {
            id: LeadId::generate(),
            user_id: owner_id,
            name,
            company_name: fields.company_name,
            email: fields.email,
            phone: fields.phone,
            status: fields.status.unwrap_or_default(),
            source: fields.source,
            notes: fields.notes,
            last_contacted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_lead(&lead).await?;
        Ok(lead)
    }

    /// Owner's leads, newest first.
    pub async fn list(&self, owner_id: UserId) -> Result<Vec<Lead>, LeadError> {
        Ok(self.store.list_leads(owner_id).await?)
    }

    /// Applies a partial update.
    ///
    /// A transition into [`LeadStatus::Converted`] additionally derives a
    /// client from the post-merge lead, atomically with the lead write.
    /// Updating a lead that is already converted never derives a second
    /// client.
    pub async fn update(
        &self,
        owner_id: UserId,
        lead_id: LeadId,
        update: LeadUpdate,
    ) -> Result<UpdateOutcome, LeadError> {
        if update.is_empty() {
            return Err(LeadError::NoFieldsProvided);
        }

        let Some(existing) = self.store.lead_by_id(owner_id, lead_id).await? else {
            return Err(LeadError::NotFound);
        };

        let mut updated = existing.clone();
        update.apply_to(&mut updated);
        updated.updated_at = Utc::now();

        let entering_converted = existing.status != LeadStatus::Converted
            && updated.status == LeadStatus::Converted;
        if entering_converted {
            let client = NewClient {
                user_id: owner_id,
                lead_id,
                name: updated.name.clone(),
                company_name: updated.company_name.clone(),
                email: updated.email.clone(),
                phone: updated.phone.clone(),
                notes: updated.notes.clone(),
            };
            let client = match self.store.convert_lead(&updated, client).await {
                Ok(client) => client,
                Err(StoreError::NotFound) => return Err(LeadError::NotFound),
                Err(err) => return Err(err.into()),
            };
            tracing::info!(
                lead_id = %lead_id,
                client_id = %client.id,
                "lead converted to client"
            );
            return Ok(UpdateOutcome::Converted {
                lead: updated,
                client,
            });
        }

        if !self.store.update_lead(&updated).await? {
            return Err(LeadError::NotFound);
        }
        Ok(UpdateOutcome::Updated(updated))
    }

    pub async fn delete(&self, owner_id: UserId, lead_id: LeadId) -> Result<(), LeadError> {
        if !self.store.delete_lead(owner_id, lead_id).await? {
            return Err(LeadError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use chrono::Duration;

    fn new_lead(name: &str) -> NewLead {
        NewLead {
            name: Some(name.to_owned()),
            ..NewLead::default()
        }
    }

    fn update_from(json: &str) -> LeadUpdate {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn create_requires_a_name() {
        let store = MemoryStore::new();
        let service = LeadService::new(&store);
        let owner = UserId::generate();

        let err = service
            .create(owner, NewLead::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LeadError::NameRequired));

        let err = service.create(owner, new_lead("")).await.unwrap_err();
        assert!(matches!(err, LeadError::NameRequired));
    }

    #[tokio::test]
    async fn create_defaults_to_the_first_pipeline_stage() {
        let store = MemoryStore::new();
        let service = LeadService::new(&store);
        let owner = UserId::generate();

        let lead = service.create(owner, new_lead("Ada Lovelace")).await.unwrap();
        assert_eq!(lead.status, LeadStatus::Leads);
        assert_eq!(lead.user_id, owner);

        let listed = service.list(owner).await.unwrap();
        assert_eq!(listed, vec![lead]);
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let store = MemoryStore::new();
        let service = LeadService::new(&store);
        let owner = UserId::generate();

        // Control created_at directly so ordering is deterministic.
        let base = Utc::now();
        for (i, name) in ["oldest", "middle", "newest"].iter().enumerate() {
            let at = base + Duration::seconds(i64::try_from(i).unwrap());
            let lead = Lead {
                id: LeadId::generate(),
                user_id: owner,
                name: (*name).to_owned(),
                company_name: None,
                email: None,
                phone: None,
                status: LeadStatus::Leads,
                source: None,
                notes: None,
                last_contacted_at: None,
                created_at: at,
                updated_at: at,
            };
            store.insert_lead(&lead).await.unwrap();
        }

        let names: Vec<String> = service
            .list(owner)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, ["newest", "middle", "oldest"]);
    }

    #[tokio::test]
    async fn update_merges_supplied_fields_and_stamps_updated_at() {
        let store = MemoryStore::new();
        let service = LeadService::new(&store);
        let owner = UserId::generate();
        let lead = service.create(owner, new_lead("Ada Lovelace")).await.unwrap();

        let outcome = service
            .update(
                owner,
                lead.id,
                update_from(r#"{"status": "Contacted", "notes": "left voicemail"}"#),
            )
            .await
            .unwrap();

        let UpdateOutcome::Updated(updated) = outcome else {
            panic!("plain update must not convert");
        };
        assert_eq!(updated.status, LeadStatus::Contacted);
        assert_eq!(updated.notes.as_deref(), Some("left voicemail"));
        assert_eq!(updated.name, "Ada Lovelace");
        assert!(updated.updated_at > lead.updated_at);
    }

    #[tokio::test]
    async fn update_with_no_fields_is_rejected_before_any_lookup() {
        let store = MemoryStore::new();
        let service = LeadService::new(&store);

        let err = service
            .update(UserId::generate(), LeadId::generate(), update_from("{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, LeadError::NoFieldsProvided));
    }

    #[tokio::test]
    async fn update_of_a_missing_lead_is_not_found() {
        let store = MemoryStore::new();
        let service = LeadService::new(&store);

        let err = service
            .update(
                UserId::generate(),
                LeadId::generate(),
                update_from(r#"{"notes": "x"}"#),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LeadError::NotFound));
    }

    #[tokio::test]
    async fn conversion_derives_a_client_from_the_merged_lead() {
        let store = MemoryStore::new();
        let service = LeadService::new(&store);
        let owner = UserId::generate();
        let lead = service
            .create(
                owner,
                NewLead {
                    name: Some("Grace Hopper".to_owned()),
                    company_name: Some("Eckert-Mauchly".to_owned()),
                    email: Some("grace@example.com".to_owned()),
                    ..NewLead::default()
                },
            )
            .await
            .unwrap();

        let outcome = service
            .update(
                owner,
                lead.id,
                update_from(r#"{"status": "Converted", "company_name": "UNIVAC"}"#),
            )
            .await
            .unwrap();

        let UpdateOutcome::Converted { lead: updated, client } = outcome else {
            panic!("expected a conversion");
        };
        assert_eq!(updated.status, LeadStatus::Converted);
        // The client reflects the update that triggered the conversion.
        assert_eq!(client.company_name.as_deref(), Some("UNIVAC"));
        assert_eq!(client.name, "Grace Hopper");
        assert_eq!(client.email.as_deref(), Some("grace@example.com"));
        assert_eq!(client.lead_id, Some(lead.id));
        assert_eq!(client.status, Client::ACTIVE_STATUS);
    }

    #[tokio::test]
    async fn only_the_transition_into_converted_derives_a_client() {
        let store = MemoryStore::new();
        let service = LeadService::new(&store);
        let owner = UserId::generate();
        let lead = service.create(owner, new_lead("Ada Lovelace")).await.unwrap();

        service
            .update(owner, lead.id, update_from(r#"{"status": "Converted"}"#))
            .await
            .unwrap();
        assert_eq!(store.client_count(owner).await, 1);

        // Re-asserting Converted, or editing the converted lead, is a plain
        // update.
        let outcome = service
            .update(
                owner,
                lead.id,
                update_from(r#"{"status": "Converted", "notes": "signed"}"#),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, UpdateOutcome::Updated(_)));
        assert_eq!(store.client_count(owner).await, 1);

        // Moving back out of Converted is a plain update too.
        let outcome = service
            .update(owner, lead.id, update_from(r#"{"status": "Lost"}"#))
            .await
            .unwrap();
        assert!(matches!(outcome, UpdateOutcome::Updated(_)));
        assert_eq!(store.client_count(owner).await, 1);
    }

    #[tokio::test]
    async fn operations_are_scoped_to_the_owner() {
        let store = MemoryStore::new();
        let service = LeadService::new(&store);
        let owner = UserId::generate();
        let stranger = UserId::generate();
        let lead = service.create(owner, new_lead("Ada Lovelace")).await.unwrap();

        let err = service
            .update(stranger, lead.id, update_from(r#"{"notes": "x"}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, LeadError::NotFound));

        let err = service.delete(stranger, lead.id).await.unwrap_err();
        assert!(matches!(err, LeadError::NotFound));

        // The owner still sees the lead untouched.
        let listed = service.list(owner).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].notes, None);
    }

    #[tokio::test]
    async fn delete_removes_the_lead() {
        let store = MemoryStore::new();
        let service = LeadService::new(&store);
        let owner = UserId::generate();
        let lead = service.create(owner, new_lead("Ada Lovelace")).await.unwrap();

        service.delete(owner, lead.id).await.unwrap();
        assert!(service.list(owner).await.unwrap().is_empty());

        let err = service.delete(owner, lead.id).await.unwrap_err();
        assert!(matches!(err, LeadError::NotFound));
    }
}
