//! Inbound webhook verification and ingestion.
//!
//! Each provider gets its own module with a pure verification function
//! (secret, raw body and header values in, verdict out) plus the ingestion
//! logic that folds an authenticated event into the store. HTTP concerns
//! (header extraction, status codes) stay in the route handlers.
//!
//! Both providers sign with HMAC-SHA256 over the raw request body; the
//! identity provider additionally binds the message id and timestamp into
//! the signed content and allows multiple candidate signatures per
//! delivery.

use hmac::Hmac;
use sha2::Sha256;

pub mod identity;
pub mod payments;

pub(crate) type HmacSha256 = Hmac<Sha256>;
