//! GCE/GKE instance metadata server client

use super::traits::ServiceAccountInfo;
use super::credentials::ServiceAccountKey;
use super::{cancellable, check_status, AccessTokenResponse};
use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

const METADATA_FLAVOR_HEADER: &str = "Metadata-Flavor";
const METADATA_FLAVOR: &str = "Google";
const DEFAULT_ACCOUNT_EMAIL: &str = "/computeMetadata/v1/instance/service-accounts/default/email";
const DEFAULT_ACCOUNT_TOKEN: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// Thin client for the metadata endpoints gtoken needs
#[derive(Debug, Clone)]
pub struct MetadataClient {
    http: reqwest::Client,
    base_url: String,
}

impl MetadataClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Email of the default service account attached to the instance
    pub async fn service_account_email(&self) -> ProviderResult<String> {
        let email = self.get(DEFAULT_ACCOUNT_EMAIL).await?.text().await?;
        let email = email.trim();
        if email.is_empty() {
            return Err(ProviderError::Decode(
                "metadata server returned an empty service account email".to_string(),
            ));
        }
        Ok(email.to_string())
    }

    /// OAuth2 access token of the default service account
    pub async fn access_token(&self) -> ProviderResult<String> {
        let body: AccessTokenResponse = self.get(DEFAULT_ACCOUNT_TOKEN).await?.json().await?;
        Ok(body.access_token)
    }

    async fn get(&self, path: &str) -> ProviderResult<reqwest::Response> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR)
            .send()
            .await?;
        check_status(response).await
    }
}

/// Service account lookup backed by the metadata server, falling back to a
/// service account key file
#[derive(Debug, Clone)]
pub struct MetadataServiceAccount {
    metadata: MetadataClient,
    credentials_file: Option<PathBuf>,
}

impl MetadataServiceAccount {
    pub fn new(metadata: MetadataClient, credentials_file: Option<PathBuf>) -> Self {
        Self {
            metadata,
            credentials_file,
        }
    }
}

#[async_trait]
impl ServiceAccountInfo for MetadataServiceAccount {
    async fn get_id(&self, cancel: &CancellationToken) -> ProviderResult<String> {
        cancellable(cancel, self.metadata.service_account_email()).await
    }

    fn get_email(&self) -> ProviderResult<String> {
        let path = self.credentials_file.as_ref().ok_or_else(|| {
            ProviderError::MissingCredentials("no service account key file configured".to_string())
        })?;

        ServiceAccountKey::load(path)?
            .client_email()
            .map(str::to_string)
    }
}
