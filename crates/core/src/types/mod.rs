//! Core types for Leadflow.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod status;
pub mod subject;

pub use email::{Email, EmailError};
pub use id::*;
pub use status::LeadStatus;
pub use subject::SubjectId;
