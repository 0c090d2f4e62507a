//! Identity and token capabilities
//!
//! The traits are what the refresher consumes; the GCP implementations talk
//! to the instance metadata server and the IAM Credentials API.

mod credentials;
mod file;
mod iam;
mod jwt;
mod metadata;
mod traits;

pub use credentials::{ServiceAccountKey, DEFAULT_TOKEN_URI};
pub use file::write_token;
pub use iam::IamTokenProvider;
pub use jwt::{expires_at, time_until_expiry};
pub use metadata::{MetadataClient, MetadataServiceAccount};
pub use traits::{ServiceAccountInfo, TokenProvider};

use crate::error::{ProviderError, ProviderResult};
use serde::Deserialize;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// OAuth2 token endpoint answer, shared by the metadata server and the
/// JWT-bearer exchange
#[derive(Debug, Deserialize)]
pub(crate) struct AccessTokenResponse {
    pub(crate) access_token: String,
}

/// Run `fut` unless `cancel` fires first
pub(crate) async fn cancellable<F, T>(cancel: &CancellationToken, fut: F) -> ProviderResult<T>
where
    F: Future<Output = ProviderResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::Cancelled),
        result = fut => result,
    }
}

/// Turn a non-success response into [`ProviderError::Status`]
pub(crate) async fn check_status(response: reqwest::Response) -> ProviderResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}
