//! ID token issuance through the IAM Credentials API

use super::credentials::ServiceAccountKey;
use super::metadata::MetadataClient;
use super::traits::TokenProvider;
use super::{cancellable, check_status, file, jwt};
use crate::error::ProviderResult;
use crate::types::{IdToken, Identity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateIdTokenRequest<'a> {
    audience: &'a str,
    include_email: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateIdTokenResponse {
    token: String,
}

/// Mints ID tokens with `generateIdToken`
///
/// Calls are authenticated with a service account key file when one is
/// configured, and as the instance's default service account otherwise.
#[derive(Debug, Clone)]
pub struct IamTokenProvider {
    http: reqwest::Client,
    metadata: MetadataClient,
    credentials_file: Option<PathBuf>,
    iam_url: String,
    audience: String,
    expiry_skew: Duration,
}

impl IamTokenProvider {
    pub fn new(
        http: reqwest::Client,
        metadata: MetadataClient,
        iam_url: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            http,
            metadata,
            credentials_file: None,
            iam_url: iam_url.into().trim_end_matches('/').to_string(),
            audience: audience.into(),
            expiry_skew: Duration::ZERO,
        }
    }

    /// Report tokens as expiring `skew` earlier than their `exp` claim
    pub fn with_expiry_skew(mut self, skew: Duration) -> Self {
        self.expiry_skew = skew;
        self
    }

    /// Authenticate with this service account key file instead of the
    /// metadata server
    pub fn with_credentials_file(mut self, path: Option<PathBuf>) -> Self {
        self.credentials_file = path;
        self
    }

    async fn access_token(&self) -> ProviderResult<String> {
        match &self.credentials_file {
            Some(path) => ServiceAccountKey::load(path)?.access_token(&self.http).await,
            None => self.metadata.access_token().await,
        }
    }

    async fn generate_id_token(&self, identity: &Identity) -> ProviderResult<IdToken> {
        let access_token = self.access_token().await?;

        let url = format!(
            "{}/v1/projects/-/serviceAccounts/{}:generateIdToken",
            self.iam_url, identity
        );
        let response = self
            .http
            .post(url)
            .bearer_auth(access_token)
            .json(&GenerateIdTokenRequest {
                audience: &self.audience,
                include_email: true,
            })
            .send()
            .await?;

        let body: GenerateIdTokenResponse = check_status(response).await?.json().await?;
        Ok(IdToken::new(body.token))
    }
}

#[async_trait]
impl TokenProvider for IamTokenProvider {
    async fn generate(
        &self,
        cancel: &CancellationToken,
        identity: &Identity,
    ) -> ProviderResult<IdToken> {
        cancellable(cancel, self.generate_id_token(identity)).await
    }

    fn validity(&self, token: &IdToken) -> ProviderResult<Duration> {
        let remaining = jwt::time_until_expiry(token.as_str(), chrono::Utc::now())?;
        Ok(remaining.saturating_sub(self.expiry_skew))
    }

    async fn write_to_file(&self, token: &IdToken, path: &Path) -> ProviderResult<()> {
        file::write_token(path, token).await
    }
}
