//! Identity resolution and entitlement.
//!
//! Resolution turns a provider subject into an internal user id, linking
//! pre-provisioned users by email on their first sign-in. Entitlement is
//! one question: does the user have at least one purchase on file?

use leadflow_core::{SubjectId, UserId};
use thiserror::Error;

use crate::db::{Store, StoreError};
use crate::identity::{IdentityError, IdentityProvider};

#[derive(Debug, Error)]
pub enum ResolveError {
    /// No user row matches the subject or its profile email; sign-up and
    /// retrying will not change this until a purchase or identity event
    /// creates the user.
    #[error("no user is linked or linkable for this subject")]
    UnknownUser,

    /// The profile email already belongs to a user linked to a different
    /// subject. Never overwritten; resolved manually.
    #[error("email already belongs to a different linked subject")]
    LinkConflict,

    #[error("identity provider lookup failed")]
    IdentityLookupFailed,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a request could not be pinned to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    UnknownUser,
    LinkConflict,
    IdentityLookupFailed,
    StoreUnavailable,
}

impl From<&ResolveError> for DenyReason {
    fn from(err: &ResolveError) -> Self {
        match err {
            ResolveError::UnknownUser => Self::UnknownUser,
            ResolveError::LinkConflict => Self::LinkConflict,
            ResolveError::IdentityLookupFailed => Self::IdentityLookupFailed,
            ResolveError::Store(_) => Self::StoreUnavailable,
        }
    }
}

/// What an authenticated subject may reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Entitled { user_id: UserId },
    Unentitled { user_id: UserId },
    Unresolved(DenyReason),
}

pub struct AccessService<'a> {
    store: &'a dyn Store,
    identity: &'a dyn IdentityProvider,
}

impl<'a> AccessService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store, identity: &'a dyn IdentityProvider) -> Self {
        Self { store, identity }
    }

    /// Resolves a provider subject to an internal user id.
    ///
    /// Fast path: the subject is already linked. Otherwise the provider
    /// profile is fetched and its email matched against existing users; an
    /// unlinked match is linked here, once, and never overwritten. The
    /// fast path does not touch the provider, so steady-state requests
    /// cost one indexed lookup.
    pub async fn resolve(&self, subject: &SubjectId) -> Result<UserId, ResolveError> {
        if let Some(user) = self.store.user_by_subject(subject).await? {
            return Ok(user.id);
        }

        let profile = match self.identity.fetch_profile(subject).await {
            Ok(profile) => profile,
            Err(IdentityError::SubjectNotFound) => return Err(ResolveError::UnknownUser),
            Err(err) => {
                tracing::warn!(subject = %subject, error = %err, "identity profile fetch failed");
                return Err(ResolveError::IdentityLookupFailed);
            }
        };
        let Some(email) = profile.email else {
            return Err(ResolveError::UnknownUser);
        };

        let Some(user) = self.store.user_by_email(&email).await? else {
            return Err(ResolveError::UnknownUser);
        };

        match &user.external_subject_id {
            Some(linked) if linked == subject => Ok(user.id),
            Some(_) => Err(ResolveError::LinkConflict),
            None => {
                let linked = match self.store.link_subject(user.id, subject).await {
                    Ok(linked) => linked,
                    Err(StoreError::Conflict(_)) => false,
                    Err(err) => return Err(err.into()),
                };
                if linked {
                    tracing::info!(
                        user_id = %user.id,
                        subject = %subject,
                        "linked subject to pre-provisioned user"
                    );
                    return Ok(user.id);
                }
                // Lost a race between the read and the conditional write.
                // Whoever won decides: same outcome, fine; anything else is
                // a conflict.
                match self.store.user_by_subject(subject).await? {
                    Some(winner) if winner.id == user.id => Ok(winner.id),
                    _ => Err(ResolveError::LinkConflict),
                }
            }
        }
    }

    /// Whether the user has any purchase on file.
    pub async fn has_entitlement(&self, user_id: UserId) -> Result<bool, StoreError> {
        let count = self.store.count_purchases(user_id).await?;
        Ok(count > 0)
    }

    /// Full access decision for a subject.
    ///
    /// Resolution failures are terminal for the request. A failed
    /// entitlement *check* is not: the user is known, so the request is
    /// allowed through on a store hiccup rather than locking a paying
    /// customer out.
    pub async fn authorize(&self, subject: &SubjectId) -> AccessDecision {
        let user_id = match self.resolve(subject).await {
            Ok(user_id) => user_id,
            Err(err) => {
                let reason = DenyReason::from(&err);
                match err {
                    ResolveError::Store(ref store_err) => {
                        tracing::error!(subject = %subject, error = %store_err, "store failure during resolution");
                    }
                    ResolveError::LinkConflict => {
                        tracing::warn!(subject = %subject, "refusing to re-link an already linked email");
                    }
                    _ => {
                        tracing::debug!(subject = %subject, error = %err, "subject did not resolve");
                    }
                }
                return AccessDecision::Unresolved(reason);
            }
        };

        match self.has_entitlement(user_id).await {
            Ok(true) => AccessDecision::Entitled { user_id },
            Ok(false) => AccessDecision::Unentitled { user_id },
            Err(err) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %err,
                    "entitlement check failed; allowing access"
                );
                AccessDecision::Entitled { user_id }
            }
        }
    }
}
