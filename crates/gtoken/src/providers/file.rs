//! Token file writer

use crate::error::ProviderResult;
use crate::types::IdToken;
use std::path::Path;

/// Overwrite `path` with the raw token, creating missing parent directories
pub async fn write_token(path: &Path, token: &IdToken) -> ProviderResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, token.as_str()).await?;

    tracing::debug!(path = %path.display(), "Token file written");
    Ok(())
}
