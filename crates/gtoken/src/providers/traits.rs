//! Capability trait definitions

use crate::error::ProviderResult;
use crate::types::{IdToken, Identity};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Lookup of the service account bound to this workload
#[async_trait]
pub trait ServiceAccountInfo: Send + Sync {
    /// Ask the environment (e.g. the metadata server) for the bound account
    async fn get_id(&self, cancel: &CancellationToken) -> ProviderResult<String>;

    /// Read the account from local credentials
    fn get_email(&self) -> ProviderResult<String>;
}

/// Issuance, inspection and persistence of ID tokens
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Mint a new token for `identity`
    ///
    /// Implementations that abandon the request on cancellation return
    /// [`ProviderError::Cancelled`](crate::error::ProviderError::Cancelled).
    async fn generate(&self, cancel: &CancellationToken, identity: &Identity)
        -> ProviderResult<IdToken>;

    /// Time left until `token` should be replaced
    fn validity(&self, token: &IdToken) -> ProviderResult<Duration>;

    /// Overwrite `path` with `token`
    async fn write_to_file(&self, token: &IdToken, path: &Path) -> ProviderResult<()>;
}
