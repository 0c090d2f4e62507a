//! gtoken library
//!
//! Issues Google ID tokens for the workload's service account and keeps them
//! on disk for a cooperating process:
//! - Identity resolution with a credentials-file fallback
//! - Refresh loop driven by each token's own expiry
//! - `/quitquitquit` control API with confirmed shutdown
//! - Metadata server and IAM Credentials providers

pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod mocks;
pub mod providers;
pub mod refresher;
pub mod server;
pub mod types;

pub use config::GtokenConfig;
pub use error::{GtokenError, GtokenResult, ProviderError, ProviderResult};
pub use identity::resolve_identity;
pub use providers::{IamTokenProvider, MetadataServiceAccount, ServiceAccountInfo, TokenProvider};
pub use refresher::Refresher;
pub use server::Server;
pub use types::{IdToken, Identity, RefreshMode};
