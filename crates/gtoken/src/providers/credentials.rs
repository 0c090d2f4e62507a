//! Service account key files
//!
//! A key file names its account (`client_email`) and carries the RSA key used
//! to obtain access tokens without the metadata server: a signed JWT-bearer
//! assertion is exchanged at the key's OAuth token endpoint.

use super::{check_status, AccessTokenResponse};
use crate::error::{ProviderError, ProviderResult};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// OAuth token endpoint used when the key file names none
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Parsed service account key file
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(default)]
    client_email: Option<String>,
    #[serde(default)]
    private_key: Option<String>,
    #[serde(default)]
    private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    /// Read and parse a key file
    pub fn load(path: &Path) -> ProviderResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| ProviderError::Decode(format!("{}: {}", path.display(), e)))
    }

    /// Account the key belongs to
    pub fn client_email(&self) -> ProviderResult<&str> {
        self.client_email
            .as_deref()
            .filter(|email| !email.is_empty())
            .ok_or_else(|| {
                ProviderError::MissingCredentials("key file has no client_email".to_string())
            })
    }

    /// RS256 JWT-bearer assertion for the cloud-platform scope, issued at `now`
    pub fn assertion(&self, now: i64) -> ProviderResult<String> {
        let private_key = self.private_key.as_deref().ok_or_else(|| {
            ProviderError::MissingCredentials("key file has no private_key".to_string())
        })?;

        let claims = AssertionClaims {
            iss: self.client_email()?,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(private_key.as_bytes())
            .map_err(|e| ProviderError::Signing(e.to_string()))?;
        jsonwebtoken::encode(&header, &claims, &key)
            .map_err(|e| ProviderError::Signing(e.to_string()))
    }

    /// Exchange a fresh assertion for an OAuth2 access token
    pub async fn access_token(&self, http: &reqwest::Client) -> ProviderResult<String> {
        let assertion = self.assertion(chrono::Utc::now().timestamp())?;

        let response = http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let body: AccessTokenResponse = check_status(response).await?.json().await?;
        Ok(body.access_token)
    }
}
