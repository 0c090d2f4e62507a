//! Service account identity resolution

use crate::error::{GtokenError, GtokenResult};
use crate::providers::ServiceAccountInfo;
use crate::types::Identity;
use tokio_util::sync::CancellationToken;

/// Resolve the identity to issue tokens for.
///
/// Asks the environment first and falls back to local credentials. When both
/// fail only the fallback failure is reported.
pub async fn resolve_identity(
    accounts: &dyn ServiceAccountInfo,
    cancel: &CancellationToken,
) -> GtokenResult<Identity> {
    match accounts.get_id(cancel).await {
        Ok(id) => {
            tracing::debug!(identity = %id, "Resolved bound service account");
            Ok(Identity::new(id))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Bound service account lookup failed, trying credentials file");
            let email = accounts.get_email().map_err(GtokenError::Resolution)?;
            tracing::debug!(identity = %email, "Resolved service account from credentials");
            Ok(Identity::new(email))
        }
    }
}
