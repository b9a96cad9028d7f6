//! Studio configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `GEMINI_API_KEY` - Google Generative Language API key
//!
//! ## Optional
//! - `STUDIO_HOST` - Bind address (default: 127.0.0.1)
//! - `STUDIO_PORT` - Listen port (default: 3002)
//! - `GEMINI_BASE_URL` - API base URL (default: <https://generativelanguage.googleapis.com/v1beta>)
//! - `GEMINI_IMAGE_MODEL` - Image-edit model (default: gemini-2.5-flash-image)
//! - `GEMINI_TEXT_MODEL` - Transcription/caption model (default: gemini-2.5-flash)
//! - `REQUEST_TIMEOUT_SECS` - Per-call timeout for remote requests (default: 90)
//! - `HISTORY_CAPACITY` - Edit history entries kept per workspace (default: 50)
//! - `WORKSPACE_IDLE_SECS` - Idle time before a workspace is evicted (default: 3600)
//! - `MAX_WORKSPACES` - Maximum concurrent workspaces (default: 256)
//! - `MAX_UPLOAD_BYTES` - Request body limit (default: 20 MiB)
//! - `STUDIO_STAFF` - Comma-separated staff roster (default: Carlos,Mario)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//!
//! ## Optional (sale ledger - enables sale recording)
//! - `SALES_WEBHOOK_URL` - Spreadsheet web-app endpoint receiving sale rows
//!
//! ## Optional (cloud storage)
//! - `DRIVE_UPLOAD_URL` - Drive multipart upload endpoint
//! - `DRIVE_FOLDER_ID` - Destination folder for uploads

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroUsize;
use std::time::Duration;

use cm_studio_core::StaffRoster;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_DRIVE_UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart&fields=id,webViewLink,name";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 90;
const DEFAULT_HISTORY_CAPACITY: usize = 50;
const DEFAULT_WORKSPACE_IDLE_SECS: u64 = 3600;
const DEFAULT_MAX_WORKSPACES: u64 = 256;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Studio application configuration.
#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Generative API configuration
    pub gemini: GeminiConfig,
    /// Workspace and history limits
    pub workspaces: WorkspaceConfig,
    /// Sale ledger webhook (optional - sale recording disabled when unset)
    pub ledger: Option<LedgerConfig>,
    /// Cloud storage configuration
    pub drive: DriveConfig,
    /// Selectable staff members
    pub staff: StaffRoster,
    /// Maximum accepted request body size
    pub max_upload_bytes: usize,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Generative Language API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key
    pub api_key: SecretString,
    /// Base URL, without trailing slash
    pub base_url: String,
    /// Model used for image edits
    pub image_model: String,
    /// Model used for transcription and captions
    pub text_model: String,
    /// Per-call timeout
    pub request_timeout: Duration,
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("image_model", &self.image_model)
            .field("text_model", &self.text_model)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Workspace registry limits.
#[derive(Debug, Clone, Copy)]
pub struct WorkspaceConfig {
    /// History entries retained per workspace
    pub history_capacity: NonZeroUsize,
    /// Idle time before a workspace is evicted
    pub idle_timeout: Duration,
    /// Maximum live workspaces
    pub max_workspaces: u64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            history_capacity: cm_studio_core::DEFAULT_HISTORY_CAPACITY,
            idle_timeout: Duration::from_secs(DEFAULT_WORKSPACE_IDLE_SECS),
            max_workspaces: DEFAULT_MAX_WORKSPACES,
        }
    }
}

/// Sale ledger webhook configuration.
///
/// The webhook URL embeds the deployment id, so `Debug` only shows the host.
#[derive(Clone)]
pub struct LedgerConfig {
    /// Endpoint receiving sale rows
    pub webhook_url: Url,
    /// Per-call timeout
    pub request_timeout: Duration,
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("webhook_host", &self.webhook_url.host_str())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Cloud storage configuration. Access tokens are supplied per request.
#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// Multipart upload endpoint
    pub upload_url: Url,
    /// Destination folder (optional)
    pub folder_id: Option<String>,
    /// Per-call timeout
    pub request_timeout: Duration,
}

impl StudioConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("STUDIO_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("STUDIO_HOST".to_string(), e.to_string()))?;
        let port = parse_env("STUDIO_PORT", 3002_u16)?;
        let request_timeout =
            Duration::from_secs(parse_env("REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?);

        let gemini = GeminiConfig::from_env(request_timeout)?;
        let workspaces = WorkspaceConfig::from_env()?;
        let ledger = LedgerConfig::from_env(request_timeout)?;
        let drive = DriveConfig::from_env(request_timeout)?;
        let staff = get_optional_env("STUDIO_STAFF")
            .map_or_else(StaffRoster::default, |names| {
                StaffRoster::from_names(names.split(','))
            });
        if staff.is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "STUDIO_STAFF".to_string(),
                "roster must contain at least one name".to_string(),
            ));
        }
        let max_upload_bytes = parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.2);

        Ok(Self {
            host,
            port,
            gemini,
            workspaces,
            ledger,
            drive,
            staff,
            max_upload_bytes,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Returns a reference to the ledger configuration (if configured).
    #[must_use]
    pub const fn ledger(&self) -> Option<&LedgerConfig> {
        self.ledger.as_ref()
    }
}

impl GeminiConfig {
    /// Load the generative API settings.
    ///
    /// # Errors
    ///
    /// Returns an error if `GEMINI_API_KEY` is missing or looks like a
    /// placeholder.
    pub fn from_env(request_timeout: Duration) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: get_validated_secret("GEMINI_API_KEY")?,
            base_url: get_env_or_default("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            image_model: get_env_or_default("GEMINI_IMAGE_MODEL", DEFAULT_IMAGE_MODEL),
            text_model: get_env_or_default("GEMINI_TEXT_MODEL", DEFAULT_TEXT_MODEL),
            request_timeout,
        })
    }
}

impl WorkspaceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let history_capacity = NonZeroUsize::new(parse_env(
            "HISTORY_CAPACITY",
            DEFAULT_HISTORY_CAPACITY,
        )?)
        .ok_or_else(|| {
            ConfigError::InvalidEnvVar(
                "HISTORY_CAPACITY".to_string(),
                "must be at least 1".to_string(),
            )
        })?;

        Ok(Self {
            history_capacity,
            idle_timeout: Duration::from_secs(parse_env(
                "WORKSPACE_IDLE_SECS",
                DEFAULT_WORKSPACE_IDLE_SECS,
            )?),
            max_workspaces: parse_env("MAX_WORKSPACES", DEFAULT_MAX_WORKSPACES)?,
        })
    }
}

impl LedgerConfig {
    fn from_env(request_timeout: Duration) -> Result<Option<Self>, ConfigError> {
        get_optional_env("SALES_WEBHOOK_URL")
            .map(|raw| {
                Ok(Self {
                    webhook_url: parse_https_url("SALES_WEBHOOK_URL", &raw)?,
                    request_timeout,
                })
            })
            .transpose()
    }
}

impl DriveConfig {
    fn from_env(request_timeout: Duration) -> Result<Self, ConfigError> {
        let raw = get_env_or_default("DRIVE_UPLOAD_URL", DEFAULT_DRIVE_UPLOAD_URL);
        Ok(Self {
            upload_url: parse_https_url("DRIVE_UPLOAD_URL", &raw)?,
            folder_id: get_optional_env("DRIVE_FOLDER_ID").filter(|id| !id.trim().is_empty()),
            request_timeout,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable, falling back to `default`.
fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse a URL, requiring HTTPS except for loopback hosts.
fn parse_https_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    let loopback = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));
    if url.scheme() != "https" && !loopback {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must use https".to_string(),
        ));
    }
    Ok(url)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the provider."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
