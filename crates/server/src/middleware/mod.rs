//! HTTP middleware stack for the CRM server.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors, trace transactions)
//! 2. Session layer (tower-sessions with `PostgreSQL` store)
//! 3. Access gate (entitlement-aware routing for protected pages)
//! 4. `TraceLayer` (request tracing)
//! 5. Security headers (CSP, isolation, no-store)

pub mod access;
pub mod auth;
pub mod security_headers;
pub mod session;

pub use access::access_gate;
pub use auth::{RequireIdentity, clear_current_identity, set_current_identity};
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
