//! REST client for the identity provider's backend API.

use leadflow_core::{Email, SubjectId};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use super::{IdentityError, IdentityProvider, SubjectProfile};
use crate::config::IdentityProviderConfig;

/// Identity provider client authenticated with the backend API token.
#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpIdentityProvider {
    pub fn new(config: &IdentityProviderConfig) -> Result<Self, IdentityError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!(
            "Bearer {}",
            config.api_token.expose_secret()
        ))
        .map_err(|_| IdentityError::Config("API token is not a valid header value".to_owned()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_owned(),
        })
    }
}

#[async_trait::async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn fetch_profile(&self, subject: &SubjectId) -> Result<SubjectProfile, IdentityError> {
        let url = format!("{}/v1/users/{}", self.base_url, subject);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(IdentityError::SubjectNotFound);
        }
        if !status.is_success() {
            return Err(IdentityError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let profile: ProfileResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Parse(e.to_string()))?;
        Ok(profile.into_subject_profile())
    }

    async fn verify_session_token(&self, token: &str) -> Result<SubjectId, IdentityError> {
        let url = format!("{}/v1/sessions/verify", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&VerifyRequest { token })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::NOT_FOUND
            || status == StatusCode::BAD_REQUEST
        {
            return Err(IdentityError::TokenRejected);
        }
        if !status.is_success() {
            return Err(IdentityError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let verified: VerifyResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Parse(e.to_string()))?;
        Ok(SubjectId::new(verified.user_id))
    }
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    user_id: String,
}

/// Profile resource as the provider serves it. Email addresses come as a
/// list with a pointer at the primary entry.
#[derive(Debug, Deserialize)]
struct ProfileResponse {
    id: String,
    #[serde(default)]
    email_addresses: Vec<EmailAddressResource>,
    #[serde(default)]
    primary_email_address_id: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmailAddressResource {
    id: String,
    email_address: String,
}

impl ProfileResponse {
    fn into_subject_profile(self) -> SubjectProfile {
        let primary = self
            .primary_email_address_id
            .as_ref()
            .and_then(|pid| self.email_addresses.iter().find(|e| &e.id == pid))
            .or_else(|| self.email_addresses.first());
        let email = primary.and_then(|e| e.email_address.parse::<Email>().ok());

        SubjectProfile {
            subject_id: SubjectId::new(self.id),
            email,
            first_name: self.first_name,
            last_name: self.last_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_prefers_the_primary_email() {
        let profile: ProfileResponse = serde_json::from_str(
            r#"{
                "id": "subj_1",
                "email_addresses": [
                    {"id": "em_1", "email_address": "old@example.com"},
                    {"id": "em_2", "email_address": "ada@example.com"}
                ],
                "primary_email_address_id": "em_2",
                "first_name": "Ada",
                "last_name": "Lovelace"
            }"#,
        )
        .unwrap();

        let subject = profile.into_subject_profile();
        assert_eq!(subject.email.as_ref().unwrap().as_str(), "ada@example.com");
        assert_eq!(subject.full_name().as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn profile_falls_back_to_the_first_email() {
        let profile: ProfileResponse = serde_json::from_str(
            r#"{
                "id": "subj_1",
                "email_addresses": [{"id": "em_1", "email_address": "ada@example.com"}]
            }"#,
        )
        .unwrap();

        let subject = profile.into_subject_profile();
        assert_eq!(subject.email.as_ref().unwrap().as_str(), "ada@example.com");
        assert_eq!(subject.full_name(), None);
    }

    #[test]
    fn profile_without_usable_email_yields_none() {
        let profile: ProfileResponse = serde_json::from_str(
            r#"{"id": "subj_1", "email_addresses": [{"id": "em_1", "email_address": "not-an-email"}]}"#,
        )
        .unwrap();

        assert_eq!(profile.into_subject_profile().email, None);
    }
}
