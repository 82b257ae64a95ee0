//! Domain models for the CRM service.
//!
//! Row types (`User`, `Lead`, `Client`, `Purchase`) derive `sqlx::FromRow`
//! and serialize with their database column names, which is also the wire
//! shape of the API. Wire-only inputs (`NewLead`, `LeadUpdate`) live beside
//! the rows they feed.

pub mod client;
pub mod lead;
pub mod purchase;
pub mod session;
pub mod user;

pub use client::{Client, NewClient};
pub use lead::{Lead, LeadUpdate, NewLead};
pub use purchase::{NewPurchase, Purchase};
pub use session::{CurrentIdentity, keys as session_keys};
pub use user::User;
