//! Identity provider boundary.
//!
//! The provider owns authentication; this service only ever asks it two
//! questions: "what profile backs this subject?" and "which subject does
//! this session token belong to?". [`http::HttpIdentityProvider`] answers
//! over the provider's REST API.

use async_trait::async_trait;
use leadflow_core::{Email, SubjectId};
use thiserror::Error;

pub mod http;

pub use http::HttpIdentityProvider;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid identity configuration: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("identity API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("subject not found")]
    SubjectNotFound,

    #[error("session token rejected")]
    TokenRejected,

    #[error("unparseable identity response: {0}")]
    Parse(String),
}

/// Profile data the provider holds for a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectProfile {
    pub subject_id: SubjectId,
    pub email: Option<Email>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl SubjectProfile {
    /// Display name assembled from whichever name halves are present.
    #[must_use]
    pub fn full_name(&self) -> Option<String> {
        derive_full_name(self.first_name.as_deref(), self.last_name.as_deref())
    }
}

/// Joins the present, non-empty halves of a name with a space. Returns
/// `None` when neither half carries anything.
#[must_use]
pub fn derive_full_name(first: Option<&str>, last: Option<&str>) -> Option<String> {
    let joined = [first, last]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!joined.is_empty()).then_some(joined)
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fetches the profile the provider holds for `subject`.
    async fn fetch_profile(&self, subject: &SubjectId) -> Result<SubjectProfile, IdentityError>;

    /// Verifies a provider-issued session token and returns the subject it
    /// belongs to.
    async fn verify_session_token(&self, token: &str) -> Result<SubjectId, IdentityError>;
}
