use chrono::{DateTime, Utc};
use leadflow_core::{Email, SubjectId, UserId};

/// An application user.
///
/// Users are keyed by email. `external_subject_id` is the identity
/// provider's stable subject and stays `None` until the user's first
/// sign-in links it; a purchase recorded before that first sign-in
/// creates the row unlinked.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub external_subject_id: Option<SubjectId>,
    pub email: Email,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether a provider subject has been linked to this user yet.
    #[must_use]
    pub const fn is_linked(&self) -> bool {
        self.external_subject_id.is_some()
    }
}
