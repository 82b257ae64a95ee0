//! Leadflow Core - Shared types library.
//!
//! This crate provides common types used across all Leadflow components:
//! - `server` - The CRM web service (API, access gate, webhook ingestors)
//! - `cli` - Command-line tools for migrations and seed data
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, emails, subject ids, and
//!   the lead status pipeline

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
