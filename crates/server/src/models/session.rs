use leadflow_core::SubjectId;
use serde::{Deserialize, Serialize};

/// Identity stored in the session after a verified sign-in.
///
/// Only the provider subject goes in the cookie-backed session; the internal
/// user id is resolved per request so link state is never stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentIdentity {
    pub subject_id: SubjectId,
}

/// Session storage keys.
pub mod keys {
    pub const CURRENT_IDENTITY: &str = "current_identity";
}
