//! Core value types shared by the resolver, the refresher and the providers

use std::fmt;

/// Service account principal used to request tokens
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Identity {
    fn from(email: String) -> Self {
        Self(email)
    }
}

impl From<&str> for Identity {
    fn from(email: &str) -> Self {
        Self(email.to_string())
    }
}

/// Issued ID token
///
/// The payload is a bearer credential, so `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct IdToken(String);

impl IdToken {
    pub fn new(jwt: impl Into<String>) -> Self {
        Self(jwt.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for IdToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdToken(<{} bytes>)", self.0.len())
    }
}

impl From<&str> for IdToken {
    fn from(jwt: &str) -> Self {
        Self(jwt.to_string())
    }
}

/// Whether a run issues once or keeps the token file fresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    OneShot,
    Continuous,
}

impl RefreshMode {
    pub fn is_continuous(self) -> bool {
        matches!(self, RefreshMode::Continuous)
    }
}

impl From<bool> for RefreshMode {
    fn from(refresh: bool) -> Self {
        if refresh {
            RefreshMode::Continuous
        } else {
            RefreshMode::OneShot
        }
    }
}
