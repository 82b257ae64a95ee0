//! Identity provider webhook: signed user lifecycle events.
//!
//! Deliveries carry three headers. The signed content is
//! `"{id}.{timestamp}.{body}"`, the secret is base64 behind an optional
//! `whsec_` prefix, and the signature header holds space-separated
//! candidates of the form `v1,<base64>` to allow secret rotation. Any one
//! matching candidate authenticates the delivery.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use hmac::Mac;
use leadflow_core::{Email, SubjectId};
use serde::Deserialize;
use thiserror::Error;

use super::HmacSha256;
use crate::db::{Store, StoreError};
use crate::identity::derive_full_name;
use crate::models::User;

pub const ID_HEADER: &str = "svix-id";
pub const TIMESTAMP_HEADER: &str = "svix-timestamp";
pub const SIGNATURE_HEADER: &str = "svix-signature";

pub const SECRET_PREFIX: &str = "whsec_";
pub const SIGNATURE_VERSION_PREFIX: &str = "v1,";

/// How far a delivery timestamp may drift from the server clock.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 5 * 60;

pub const USER_CREATED: &str = "user.created";
pub const USER_UPDATED: &str = "user.updated";

/// The three delivery headers, already extracted from the request.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeHeaders<'a> {
    pub id: &'a str,
    pub timestamp: &'a str,
    pub signature: &'a str,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// The configured secret does not decode; a server problem, not a
    /// caller problem.
    #[error("webhook secret is not valid base64")]
    MalformedSecret,

    #[error("timestamp header is not a unix timestamp")]
    MalformedTimestamp,

    #[error("timestamp is outside the tolerance window")]
    StaleTimestamp,

    #[error("no candidate signature matched")]
    SignatureMismatch,
}

/// Verifies a delivery against the endpoint secret.
///
/// `now` is passed in so the tolerance window is testable.
pub fn verify_envelope(
    secret: &str,
    body: &[u8],
    headers: &EnvelopeHeaders<'_>,
    now: DateTime<Utc>,
) -> Result<(), EnvelopeError> {
    let encoded_key = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
    let key = BASE64
        .decode(encoded_key)
        .map_err(|_| EnvelopeError::MalformedSecret)?;

    let timestamp: i64 = headers
        .timestamp
        .parse()
        .map_err(|_| EnvelopeError::MalformedTimestamp)?;
    if (now.timestamp() - timestamp).abs() > TIMESTAMP_TOLERANCE_SECS {
        return Err(EnvelopeError::StaleTimestamp);
    }

    let mut signed_content =
        Vec::with_capacity(headers.id.len() + headers.timestamp.len() + body.len() + 2);
    signed_content.extend_from_slice(headers.id.as_bytes());
    signed_content.push(b'.');
    signed_content.extend_from_slice(headers.timestamp.as_bytes());
    signed_content.push(b'.');
    signed_content.extend_from_slice(body);

    for candidate in headers.signature.split_whitespace() {
        let Some(encoded) = candidate.strip_prefix(SIGNATURE_VERSION_PREFIX) else {
            continue;
        };
        let Ok(candidate_bytes) = BASE64.decode(encoded) else {
            continue;
        };
        let mut mac =
            HmacSha256::new_from_slice(&key).map_err(|_| EnvelopeError::MalformedSecret)?;
        mac.update(&signed_content);
        // verify_slice compares in constant time.
        if mac.verify_slice(&candidate_bytes).is_ok() {
            return Ok(());
        }
    }

    Err(EnvelopeError::SignatureMismatch)
}

/// A user lifecycle event, post-verification.
#[derive(Debug, Deserialize)]
pub struct IdentityEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: SubjectData,
}

#[derive(Debug, Deserialize)]
pub struct SubjectData {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub primary_email_address_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailAddress {
    #[serde(default)]
    pub id: Option<String>,
    pub email_address: String,
}

impl SubjectData {
    /// The address flagged as primary, falling back to the first one.
    #[must_use]
    pub fn primary_email(&self) -> Option<&str> {
        self.primary_email_address_id
            .as_ref()
            .and_then(|pid| {
                self.email_addresses
                    .iter()
                    .find(|e| e.id.as_ref() == Some(pid))
            })
            .or_else(|| self.email_addresses.first())
            .map(|e| e.email_address.as_str())
    }
}

pub fn parse_event(body: &[u8]) -> Result<IdentityEvent, serde_json::Error> {
    serde_json::from_slice(body)
}

#[derive(Debug)]
pub enum IdentityIngest {
    /// The user row now reflects the event.
    Synced(User),
    /// An event type this service does not track; acknowledged unprocessed.
    Ignored,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("event carries no usable email address")]
    MissingEmail,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Folds a verified event into the store.
pub async fn ingest(
    store: &dyn Store,
    event: &IdentityEvent,
) -> Result<IdentityIngest, IngestError> {
    if event.event_type != USER_CREATED && event.event_type != USER_UPDATED {
        return Ok(IdentityIngest::Ignored);
    }

    let email = event
        .data
        .primary_email()
        .and_then(|raw| raw.parse::<Email>().ok())
        .ok_or(IngestError::MissingEmail)?;
    let full_name = derive_full_name(
        event.data.first_name.as_deref(),
        event.data.last_name.as_deref(),
    );

    let subject = SubjectId::from(event.data.id.as_str());
    let user = store
        .upsert_user_identity(&subject, &email, full_name)
        .await?;
    Ok(IdentityIngest::Synced(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    // 32 zero bytes, base64-encoded.
    const TEST_SECRET: &str = "whsec_AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

    fn sign(secret: &str, id: &str, timestamp: &str, body: &[u8]) -> String {
        let encoded_key = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
        let key = BASE64.decode(encoded_key).unwrap();
        let mut mac = HmacSha256::new_from_slice(&key).unwrap();
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        format!("v1,{}", BASE64.encode(mac.finalize().into_bytes()))
    }

    fn fresh_timestamp() -> String {
        Utc::now().timestamp().to_string()
    }

    #[test]
    fn accepts_a_correctly_signed_delivery() {
        let body = br#"{"type":"user.created","data":{"id":"subj_1"}}"#;
        let id = "msg_2Yv8qX";
        let ts = fresh_timestamp();
        let signature = sign(TEST_SECRET, id, &ts, body);

        let headers = EnvelopeHeaders {
            id,
            timestamp: &ts,
            signature: &signature,
        };
        assert_eq!(verify_envelope(TEST_SECRET, body, &headers, Utc::now()), Ok(()));
    }

    #[test]
    fn accepts_when_any_candidate_matches() {
        let body = b"{}";
        let id = "msg_1";
        let ts = fresh_timestamp();
        let good = sign(TEST_SECRET, id, &ts, body);
        let signature = format!("v1,bm9wZQ== not-a-candidate {good}");

        let headers = EnvelopeHeaders {
            id,
            timestamp: &ts,
            signature: &signature,
        };
        assert_eq!(verify_envelope(TEST_SECRET, body, &headers, Utc::now()), Ok(()));
    }

    #[test]
    fn rejects_a_tampered_body() {
        let id = "msg_1";
        let ts = fresh_timestamp();
        let signature = sign(TEST_SECRET, id, &ts, b"{\"a\":1}");

        let headers = EnvelopeHeaders {
            id,
            timestamp: &ts,
            signature: &signature,
        };
        assert_eq!(
            verify_envelope(TEST_SECRET, b"{\"a\":2}", &headers, Utc::now()),
            Err(EnvelopeError::SignatureMismatch)
        );
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let body = b"{}";
        let id = "msg_1";
        let stale = (Utc::now().timestamp() - TIMESTAMP_TOLERANCE_SECS - 1).to_string();
        let signature = sign(TEST_SECRET, id, &stale, body);

        let headers = EnvelopeHeaders {
            id,
            timestamp: &stale,
            signature: &signature,
        };
        assert_eq!(
            verify_envelope(TEST_SECRET, body, &headers, Utc::now()),
            Err(EnvelopeError::StaleTimestamp)
        );
    }

    #[test]
    fn rejects_a_malformed_timestamp() {
        let headers = EnvelopeHeaders {
            id: "msg_1",
            timestamp: "yesterday",
            signature: "v1,AAAA",
        };
        assert_eq!(
            verify_envelope(TEST_SECRET, b"{}", &headers, Utc::now()),
            Err(EnvelopeError::MalformedTimestamp)
        );
    }

    #[test]
    fn rejects_a_secret_that_is_not_base64() {
        let ts = fresh_timestamp();
        let headers = EnvelopeHeaders {
            id: "msg_1",
            timestamp: &ts,
            signature: "v1,AAAA",
        };
        assert_eq!(
            verify_envelope("whsec_not base64!", b"{}", &headers, Utc::now()),
            Err(EnvelopeError::MalformedSecret)
        );
    }

    #[test]
    fn secret_prefix_is_optional() {
        let body = b"{}";
        let id = "msg_1";
        let ts = fresh_timestamp();
        let bare_secret = TEST_SECRET.strip_prefix(SECRET_PREFIX).unwrap();
        let signature = sign(bare_secret, id, &ts, body);

        let headers = EnvelopeHeaders {
            id,
            timestamp: &ts,
            signature: &signature,
        };
        assert_eq!(verify_envelope(bare_secret, body, &headers, Utc::now()), Ok(()));
    }

    #[test]
    fn parses_a_user_created_event() {
        let event = parse_event(
            br#"{
                "type": "user.created",
                "data": {
                    "id": "subj_1",
                    "email_addresses": [
                        {"id": "em_1", "email_address": "ada@example.com"}
                    ],
                    "primary_email_address_id": "em_1",
                    "first_name": "Ada",
                    "last_name": "Lovelace"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(event.event_type, USER_CREATED);
        assert_eq!(event.data.primary_email(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn ingest_creates_and_updates_users() {
        let store = MemoryStore::new();

        let created = parse_event(
            br#"{"type":"user.created","data":{"id":"subj_1","email_addresses":[{"id":"em_1","email_address":"ada@example.com"}],"first_name":"Ada"}}"#,
        )
        .unwrap();
        let IdentityIngest::Synced(user) = ingest(&store, &created).await.unwrap() else {
            panic!("expected a sync");
        };
        assert_eq!(user.email.as_str(), "ada@example.com");
        assert_eq!(user.full_name.as_deref(), Some("Ada"));

        let updated = parse_event(
            br#"{"type":"user.updated","data":{"id":"subj_1","email_addresses":[{"id":"em_1","email_address":"countess@example.com"}],"first_name":"Ada","last_name":"Lovelace"}}"#,
        )
        .unwrap();
        let IdentityIngest::Synced(user) = ingest(&store, &updated).await.unwrap() else {
            panic!("expected a sync");
        };
        assert_eq!(user.email.as_str(), "countess@example.com");
        assert_eq!(user.full_name.as_deref(), Some("Ada Lovelace"));
    }

    #[tokio::test]
    async fn ingest_requires_an_email() {
        let store = MemoryStore::new();
        let event = parse_event(br#"{"type":"user.created","data":{"id":"subj_1"}}"#).unwrap();

        let err = ingest(&store, &event).await.unwrap_err();
        assert!(matches!(err, IngestError::MissingEmail));
    }

    #[tokio::test]
    async fn ingest_ignores_unrelated_events() {
        let store = MemoryStore::new();
        let event =
            parse_event(br#"{"type":"session.created","data":{"id":"sess_1"}}"#).unwrap();

        assert!(matches!(
            ingest(&store, &event).await.unwrap(),
            IdentityIngest::Ignored
        ));
    }
}
