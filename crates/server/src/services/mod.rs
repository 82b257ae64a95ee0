//! Domain services.
//!
//! [`access`] decides who a request belongs to and what they may reach;
//! [`leads`] owns the lead lifecycle. Services borrow the store and the
//! identity provider as trait objects so every rule in here runs unchanged
//! against the in-memory store in tests.

pub mod access;
pub mod leads;

pub use access::{AccessDecision, AccessService, DenyReason, ResolveError};
pub use leads::{LeadError, LeadService, UpdateOutcome};
