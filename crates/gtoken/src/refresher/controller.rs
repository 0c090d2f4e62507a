//! Issue → persist → wait cycle

use crate::error::{GtokenError, GtokenResult, ProviderError};
use crate::identity::resolve_identity;
use crate::providers::{ServiceAccountInfo, TokenProvider};
use crate::types::{IdToken, Identity, RefreshMode};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Shortest wait between two issuances in continuous mode
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Keeps one token file populated for one service account
pub struct Refresher {
    accounts: Arc<dyn ServiceAccountInfo>,
    tokens: Arc<dyn TokenProvider>,
    file: PathBuf,
    mode: RefreshMode,
    min_interval: Duration,
}

impl Refresher {
    /// Create a new refresher
    pub fn new(
        accounts: Arc<dyn ServiceAccountInfo>,
        tokens: Arc<dyn TokenProvider>,
        file: impl Into<PathBuf>,
        mode: RefreshMode,
    ) -> Self {
        Self {
            accounts,
            tokens,
            file: file.into(),
            mode,
            min_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }

    /// Override the floor applied to the token's reported validity
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    /// Run until the token is written once (one-shot), or until `cancel`
    /// fires (continuous).
    ///
    /// Cancellation is a successful outcome. Every other failure ends the run
    /// and is returned as is; nothing is retried.
    pub async fn run(&self, cancel: &CancellationToken) -> GtokenResult<()> {
        let identity = resolve_identity(self.accounts.as_ref(), cancel).await?;

        tracing::info!(
            identity = %identity,
            path = %self.file.display(),
            mode = ?self.mode,
            "Token refresher started"
        );

        loop {
            let Some(token) = self.issue(cancel, &identity).await? else {
                tracing::info!("Token issuance abandoned on cancellation");
                return Ok(());
            };

            self.tokens
                .write_to_file(&token, &self.file)
                .await
                .map_err(|source| GtokenError::Persistence {
                    path: self.file.clone(),
                    source,
                })?;

            tracing::info!(
                identity = %identity,
                path = %self.file.display(),
                "ID token written"
            );

            if !self.mode.is_continuous() {
                return Ok(());
            }

            let validity = self
                .tokens
                .validity(&token)
                .map_err(GtokenError::ValidityInspection)?;
            let wait = self.next_wait(validity);

            tracing::debug!(
                validity_secs = validity.as_secs(),
                wait_secs = wait.as_secs(),
                "Waiting before next token refresh"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Token refresh cancelled");
                    return Ok(());
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// `None` when the provider gave up because of cancellation
    async fn issue(
        &self,
        cancel: &CancellationToken,
        identity: &Identity,
    ) -> GtokenResult<Option<IdToken>> {
        match self.tokens.generate(cancel, identity).await {
            Ok(token) => Ok(Some(token)),
            Err(ProviderError::Cancelled) => Ok(None),
            Err(e) => Err(GtokenError::Issuance(e)),
        }
    }

    fn next_wait(&self, validity: Duration) -> Duration {
        if validity < self.min_interval {
            tracing::warn!(
                validity_ms = validity.as_millis() as u64,
                floor_ms = self.min_interval.as_millis() as u64,
                "Token validity below minimum refresh interval"
            );
            return self.min_interval;
        }
        validity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockServiceAccountInfo, MockTokenProvider};

    const TEST_EMAIL: &str = "test@project.iam.gserviceaccount.com";
    const TEST_FILE: &str = "jwt.token";

    fn refresher(
        accounts: &Arc<MockServiceAccountInfo>,
        tokens: &Arc<MockTokenProvider>,
        mode: RefreshMode,
    ) -> Refresher {
        Refresher::new(accounts.clone(), tokens.clone(), TEST_FILE, mode)
    }

    #[tokio::test]
    async fn test_one_time_token_generation() {
        let accounts = Arc::new(MockServiceAccountInfo::bound(TEST_EMAIL));
        let tokens = Arc::new(MockTokenProvider::new("whatever"));

        refresher(&accounts, &tokens, RefreshMode::OneShot)
            .run(&CancellationToken::new())
            .await
            .unwrap();

        let calls = tokens.calls();
        assert_eq!(calls.generated_for, vec![Identity::new(TEST_EMAIL)]);
        assert_eq!(
            calls.written,
            vec![("whatever".to_string(), PathBuf::from(TEST_FILE))]
        );
        assert_eq!(calls.validity_checks, 0);
        assert_eq!(accounts.email_calls(), 0);
    }

    #[tokio::test]
    async fn test_one_shot_ignores_cancellation_state() {
        let accounts = Arc::new(MockServiceAccountInfo::bound(TEST_EMAIL));
        let tokens = Arc::new(MockTokenProvider::new("whatever"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        refresher(&accounts, &tokens, RefreshMode::OneShot)
            .run(&cancel)
            .await
            .unwrap();

        assert_eq!(tokens.generate_calls(), 1);
        assert_eq!(tokens.write_calls(), 1);
    }

    #[tokio::test]
    async fn test_one_time_token_generation_from_email() {
        let accounts = Arc::new(MockServiceAccountInfo::from_credentials(TEST_EMAIL));
        let tokens = Arc::new(MockTokenProvider::new("whatever"));

        refresher(&accounts, &tokens, RefreshMode::OneShot)
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(accounts.id_calls(), 1);
        assert_eq!(accounts.email_calls(), 1);
        assert_eq!(tokens.calls().generated_for, vec![Identity::new(TEST_EMAIL)]);
    }

    #[tokio::test]
    async fn test_failed_to_find_sa() {
        let accounts = Arc::new(MockServiceAccountInfo::unresolvable());
        let tokens = Arc::new(MockTokenProvider::new("whatever"));

        let err = refresher(&accounts, &tokens, RefreshMode::Continuous)
            .run(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GtokenError::Resolution(_)));
        assert_eq!(tokens.generate_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_to_generate_token() {
        let accounts = Arc::new(MockServiceAccountInfo::bound(TEST_EMAIL));
        let tokens = Arc::new(MockTokenProvider::new("whatever").failing_generate());

        let err = refresher(&accounts, &tokens, RefreshMode::OneShot)
            .run(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GtokenError::Issuance(_)));
        assert_eq!(tokens.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_to_write_token() {
        let accounts = Arc::new(MockServiceAccountInfo::bound(TEST_EMAIL));
        let tokens = Arc::new(MockTokenProvider::new("whatever").failing_write_after(0));

        let err = refresher(&accounts, &tokens, RefreshMode::Continuous)
            .run(&CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            GtokenError::Persistence { path, .. } => assert_eq!(path, PathBuf::from(TEST_FILE)),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(tokens.calls().validity_checks, 0);
    }

    #[tokio::test]
    async fn test_failed_to_get_duration_from_token() {
        let accounts = Arc::new(MockServiceAccountInfo::bound(TEST_EMAIL));
        let tokens = Arc::new(MockTokenProvider::new("whatever"));

        let err = refresher(&accounts, &tokens, RefreshMode::Continuous)
            .run(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GtokenError::ValidityInspection(_)));
        assert_eq!(tokens.generate_calls(), 1);
        assert_eq!(tokens.write_calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_issuance_is_not_an_error() {
        let accounts = Arc::new(MockServiceAccountInfo::bound(TEST_EMAIL));
        let tokens = Arc::new(MockTokenProvider::new("whatever").cancelled_generate());

        refresher(&accounts, &tokens, RefreshMode::Continuous)
            .run(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(tokens.write_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_token_generation() {
        let accounts = Arc::new(MockServiceAccountInfo::bound(TEST_EMAIL));
        let tokens = Arc::new(MockTokenProvider::new("whatever").with_validity(Duration::from_secs(31)));
        let cancel = CancellationToken::new();

        let task = {
            let refresher = refresher(&accounts, &tokens, RefreshMode::Continuous);
            let cancel = cancel.clone();
            tokio::spawn(async move { refresher.run(&cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(32)).await;
        cancel.cancel();
        task.await.unwrap().unwrap();

        let calls = tokens.calls();
        assert_eq!(calls.generated_for.len(), 2);
        assert_eq!(calls.written.len(), 2);
        assert_eq!(calls.validity_checks, 2);
        assert_eq!(accounts.id_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_wait() {
        let accounts = Arc::new(MockServiceAccountInfo::bound(TEST_EMAIL));
        let tokens =
            Arc::new(MockTokenProvider::new("whatever").with_validity(Duration::from_secs(3600)));
        let cancel = CancellationToken::new();

        let task = {
            let refresher = refresher(&accounts, &tokens, RefreshMode::Continuous);
            let cancel = cancel.clone();
            tokio::spawn(async move { refresher.run(&cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(10)).await;
        let cancelled_at = tokio::time::Instant::now();
        cancel.cancel();
        task.await.unwrap().unwrap();

        assert_eq!(tokio::time::Instant::now(), cancelled_at);
        assert_eq!(tokens.generate_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_wins_tie_with_timer() {
        let accounts = Arc::new(MockServiceAccountInfo::bound(TEST_EMAIL));
        let tokens = Arc::new(MockTokenProvider::new("whatever").with_validity(Duration::ZERO));
        let cancel = CancellationToken::new();
        cancel.cancel();

        refresher(&accounts, &tokens, RefreshMode::Continuous)
            .with_min_interval(Duration::ZERO)
            .run(&cancel)
            .await
            .unwrap();

        assert_eq!(tokens.generate_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_validity_is_floored() {
        let accounts = Arc::new(MockServiceAccountInfo::bound(TEST_EMAIL));
        let tokens = Arc::new(MockTokenProvider::new("whatever").with_validity(Duration::ZERO));
        let cancel = CancellationToken::new();

        let task = {
            let refresher = refresher(&accounts, &tokens, RefreshMode::Continuous)
                .with_min_interval(Duration::from_secs(5));
            let cancel = cancel.clone();
            tokio::spawn(async move { refresher.run(&cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(tokens.generate_calls(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(tokens.generate_calls(), 2);

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_in_later_cycle_stops_refresh() {
        let accounts = Arc::new(MockServiceAccountInfo::bound(TEST_EMAIL));
        let tokens = Arc::new(
            MockTokenProvider::new("whatever")
                .with_validity(Duration::from_secs(31))
                .failing_write_after(1),
        );

        let err = refresher(&accounts, &tokens, RefreshMode::Continuous)
            .run(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GtokenError::Persistence { .. }));
        assert_eq!(tokens.generate_calls(), 2);
        assert_eq!(tokens.write_calls(), 1);
    }
}
