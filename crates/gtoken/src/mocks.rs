//! In-memory capabilities for tests and local runs
//!
//! Both mocks record every call so callers can assert on the exact sequence
//! of lookups, issuances and writes.

use crate::error::{ProviderError, ProviderResult};
use crate::providers::{ServiceAccountInfo, TokenProvider};
use crate::types::{IdToken, Identity};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Service account lookup with fixed answers.
pub struct MockServiceAccountInfo {
    id: Option<String>,
    email: Option<String>,
    id_calls: AtomicUsize,
    email_calls: AtomicUsize,
}

impl MockServiceAccountInfo {
    /// Primary lookup succeeds with `id`.
    pub fn bound(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            email: None,
            id_calls: AtomicUsize::new(0),
            email_calls: AtomicUsize::new(0),
        }
    }

    /// Primary lookup fails, credentials file yields `email`.
    pub fn from_credentials(email: impl Into<String>) -> Self {
        Self {
            id: None,
            email: Some(email.into()),
            id_calls: AtomicUsize::new(0),
            email_calls: AtomicUsize::new(0),
        }
    }

    /// Both lookups fail.
    pub fn unresolvable() -> Self {
        Self {
            id: None,
            email: None,
            id_calls: AtomicUsize::new(0),
            email_calls: AtomicUsize::new(0),
        }
    }

    pub fn id_calls(&self) -> usize {
        self.id_calls.load(Ordering::SeqCst)
    }

    pub fn email_calls(&self) -> usize {
        self.email_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceAccountInfo for MockServiceAccountInfo {
    async fn get_id(&self, _cancel: &CancellationToken) -> ProviderResult<String> {
        self.id_calls.fetch_add(1, Ordering::SeqCst);
        self.id
            .clone()
            .ok_or_else(|| ProviderError::Decode("failed to get sa".to_string()))
    }

    fn get_email(&self) -> ProviderResult<String> {
        self.email_calls.fetch_add(1, Ordering::SeqCst);
        self.email
            .clone()
            .ok_or_else(|| ProviderError::MissingCredentials("failed to get sa email".to_string()))
    }
}

#[derive(Debug, Clone, Copy)]
enum Generate {
    Succeed,
    Fail,
    Cancelled,
}

/// Calls observed by [`MockTokenProvider`]
#[derive(Debug, Default, Clone)]
pub struct MockTokenCalls {
    /// Identity of every `generate` call, in order
    pub generated_for: Vec<Identity>,
    /// Token and path of every `write_to_file` call, in order
    pub written: Vec<(String, PathBuf)>,
    /// Number of `validity` calls
    pub validity_checks: usize,
}

/// Token provider returning a fixed token.
pub struct MockTokenProvider {
    token: String,
    generate: Generate,
    validity: Option<Duration>,
    successful_writes: Option<usize>,
    calls: Mutex<MockTokenCalls>,
}

impl MockTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            generate: Generate::Succeed,
            validity: None,
            successful_writes: None,
            calls: Mutex::new(MockTokenCalls::default()),
        }
    }

    /// Report `validity` for every token. Without this `validity` fails.
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = Some(validity);
        self
    }

    /// Every issuance fails.
    pub fn failing_generate(mut self) -> Self {
        self.generate = Generate::Fail;
        self
    }

    /// Every issuance reports that it was abandoned on cancellation.
    pub fn cancelled_generate(mut self) -> Self {
        self.generate = Generate::Cancelled;
        self
    }

    /// Let `n` writes succeed, fail every one after that.
    pub fn failing_write_after(mut self, n: usize) -> Self {
        self.successful_writes = Some(n);
        self
    }

    pub fn calls(&self) -> MockTokenCalls {
        self.lock().clone()
    }

    pub fn generate_calls(&self) -> usize {
        self.lock().generated_for.len()
    }

    pub fn write_calls(&self) -> usize {
        self.lock().written.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockTokenCalls> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TokenProvider for MockTokenProvider {
    async fn generate(
        &self,
        _cancel: &CancellationToken,
        identity: &Identity,
    ) -> ProviderResult<IdToken> {
        self.lock().generated_for.push(identity.clone());
        match self.generate {
            Generate::Succeed => Ok(IdToken::new(self.token.clone())),
            Generate::Fail => Err(ProviderError::Status {
                status: 500,
                body: "failed to generate ID token".to_string(),
            }),
            Generate::Cancelled => Err(ProviderError::Cancelled),
        }
    }

    fn validity(&self, _token: &IdToken) -> ProviderResult<Duration> {
        self.lock().validity_checks += 1;
        self.validity
            .ok_or_else(|| ProviderError::Decode("failed to get duration".to_string()))
    }

    async fn write_to_file(&self, token: &IdToken, path: &Path) -> ProviderResult<()> {
        let mut calls = self.lock();
        if let Some(limit) = self.successful_writes {
            if calls.written.len() >= limit {
                return Err(ProviderError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "failed to write token to file",
                )));
            }
        }
        calls
            .written
            .push((token.as_str().to_string(), path.to_path_buf()));
        Ok(())
    }
}
