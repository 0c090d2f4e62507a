//! Configuration for gtoken

use crate::refresher::DEFAULT_MIN_REFRESH_INTERVAL;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming a service account key file
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GtokenConfig {
    /// Control server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Token output configuration
    #[serde(default)]
    pub token: TokenConfig,

    /// Refresh timing configuration
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Google Cloud endpoints
    #[serde(default)]
    pub gcp: GcpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Control server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

/// Token output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// File the token is written to
    #[serde(default = "default_token_file")]
    pub file: PathBuf,

    /// Keep re-issuing the token before it expires
    #[serde(default = "default_true")]
    pub refresh: bool,

    /// Audience claim requested for the token
    #[serde(default = "default_audience")]
    pub audience: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            file: default_token_file(),
            refresh: true,
            audience: default_audience(),
        }
    }
}

/// Refresh timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Shortest wait between two issuances, in seconds
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: u64,

    /// Replace tokens this many seconds before their `exp` claim
    #[serde(default)]
    pub expiry_skew_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval(),
            expiry_skew_secs: 0,
        }
    }
}

impl ScheduleConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }

    pub fn expiry_skew(&self) -> Duration {
        Duration::from_secs(self.expiry_skew_secs)
    }
}

/// Google Cloud endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpConfig {
    /// Instance metadata server base URL
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,

    /// IAM Credentials API base URL
    #[serde(default = "default_iam_credentials_url")]
    pub iam_credentials_url: String,

    /// Service account key file; falls back to `GOOGLE_APPLICATION_CREDENTIALS`
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            metadata_url: default_metadata_url(),
            iam_credentials_url: default_iam_credentials_url(),
            credentials_file: None,
            request_timeout_secs: 30,
        }
    }
}

impl GcpConfig {
    /// Key file to read the fallback identity from
    pub fn credentials_path(&self) -> Option<PathBuf> {
        self.credentials_file
            .clone()
            .or_else(|| std::env::var_os(CREDENTIALS_ENV).map(PathBuf::from))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_token_file() -> PathBuf {
    PathBuf::from("/var/run/secrets/aws/token/gtoken")
}

fn default_audience() -> String {
    "gtoken/sts/assume-role-with-web-identity".to_string()
}

fn default_min_interval() -> u64 {
    DEFAULT_MIN_REFRESH_INTERVAL.as_secs()
}

fn default_metadata_url() -> String {
    "http://metadata.google.internal".to_string()
}

fn default_iam_credentials_url() -> String {
    "https://iamcredentials.googleapis.com".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl GtokenConfig {
    /// Load configuration from defaults, an optional file and `GTOKEN_*`
    /// environment variables, in increasing precedence.
    ///
    /// Nested keys use a double underscore, e.g. `GTOKEN_TOKEN__FILE`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&GtokenConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add environment variables with GTOKEN_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("GTOKEN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
