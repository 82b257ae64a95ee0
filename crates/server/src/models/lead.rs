use chrono::{DateTime, Utc};
use leadflow_core::{LeadId, LeadStatus, UserId};
use serde::Deserialize;

/// A sales lead owned by a single user.
#[derive(Debug, Clone, PartialEq, serde::Serialize, sqlx::FromRow)]
pub struct Lead {
    pub id: LeadId,
    pub user_id: UserId,
    pub name: String,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: LeadStatus,
    pub source: Option<String>,
    pub notes: Option<String>,
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `POST /api/leads`.
///
/// Everything except the name is optional. `name` is validated in the
/// lead service rather than at the deserializer so the caller gets the
/// same error for a missing name and an empty one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewLead {
    pub name: Option<String>,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<LeadStatus>,
    pub source: Option<String>,
    pub notes: Option<String>,
}

/// Request body for `PATCH /api/leads/{id}`.
///
/// Distinguishes "field absent" (outer `None`, leave untouched) from
/// "field explicitly null" (`Some(None)`, clear it). `status` and `name`
/// are non-nullable columns, so an explicit null there is treated the
/// same as absent. `source` is fixed at creation and not patchable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LeadUpdate {
    pub name: Option<String>,
    pub status: Option<LeadStatus>,
    #[serde(deserialize_with = "double_option")]
    pub company_name: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub last_contacted_at: Option<Option<DateTime<Utc>>>,
}

/// Present-but-null deserializes to `Some(None)`; absent fields fall back
/// to the struct-level default of `None`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

impl LeadUpdate {
    /// True when no field was supplied at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.status.is_none()
            && self.company_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.notes.is_none()
            && self.last_contacted_at.is_none()
    }

    /// Merges the supplied fields into `lead`, leaving absent ones untouched.
    pub fn apply_to(&self, lead: &mut Lead) {
        if let Some(name) = &self.name {
            lead.name.clone_from(name);
        }
        if let Some(status) = self.status {
            lead.status = status;
        }
        if let Some(company_name) = &self.company_name {
            lead.company_name.clone_from(company_name);
        }
        if let Some(email) = &self.email {
            lead.email.clone_from(email);
        }
        if let Some(phone) = &self.phone {
            lead.phone.clone_from(phone);
        }
        if let Some(notes) = &self.notes {
            lead.notes.clone_from(notes);
        }
        if let Some(last_contacted_at) = self.last_contacted_at {
            lead.last_contacted_at = last_contacted_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_lead() -> Lead {
        let now = Utc::now();
        Lead {
            id: LeadId::generate(),
            user_id: UserId::generate(),
            name: "Ada Lovelace".to_owned(),
            company_name: Some("Analytical Engines Ltd".to_owned()),
            email: Some("ada@example.com".to_owned()),
            phone: None,
            status: LeadStatus::Leads,
            source: Some("referral".to_owned()),
            notes: Some("met at conference".to_owned()),
            last_contacted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn absent_null_and_value_are_distinct() {
        let update: LeadUpdate =
            serde_json::from_str(r#"{"notes": null, "phone": "+44 20 0000"}"#).unwrap();
        assert_eq!(update.company_name, None);
        assert_eq!(update.notes, Some(None));
        assert_eq!(update.phone, Some(Some("+44 20 0000".to_owned())));
    }

    #[test]
    fn empty_object_is_empty() {
        let update: LeadUpdate = serde_json::from_str("{}").unwrap();
        assert!(update.is_empty());

        let update: LeadUpdate = serde_json::from_str(r#"{"notes": null}"#).unwrap();
        assert!(!update.is_empty());
    }

    #[test]
    fn unknown_status_is_rejected() {
        let result = serde_json::from_str::<LeadUpdate>(r#"{"status": "Qualified"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn apply_merges_only_supplied_fields() {
        let mut lead = sample_lead();
        let update: LeadUpdate =
            serde_json::from_str(r#"{"status": "Contacted", "notes": null}"#).unwrap();

        update.apply_to(&mut lead);

        assert_eq!(lead.status, LeadStatus::Contacted);
        assert_eq!(lead.notes, None);
        // Untouched fields survive the merge.
        assert_eq!(lead.name, "Ada Lovelace");
        assert_eq!(lead.email, Some("ada@example.com".to_owned()));
    }

    #[test]
    fn null_name_is_ignored() {
        let mut lead = sample_lead();
        let update: LeadUpdate = serde_json::from_str(r#"{"name": null}"#).unwrap();
        assert!(update.is_empty());

        update.apply_to(&mut lead);
        assert_eq!(lead.name, "Ada Lovelace");
    }
}
