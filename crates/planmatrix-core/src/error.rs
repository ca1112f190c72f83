//! Core error types for planmatrix-core.
//!
//! Every failure is classified here, at the type level. Service-call
//! failures are mapped from HTTP status + error reason at the client
//! boundary; nothing downstream inspects message strings.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use thiserror::Error;

/// Core error type for planmatrix-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Table store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Header schema errors
    #[error("{0}")]
    Schema(#[from] SchemaError),

    /// Pre-sync validation errors
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Calendar service errors
    #[error("Calendar service error: {0}")]
    Service(#[from] ServiceError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// OAuth errors
    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    /// The archive drain could not acquire its lock within the wait bound
    #[error("Archive drain lock not acquired within {waited_ms} ms")]
    LockTimeout { waited_ms: u64 },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Table store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Store migration failed: {0}")]
    MigrationFailed(String),

    #[error("Row range at {start} (count {count}) out of bounds (table has {len} rows)")]
    RangeOutOfBounds {
        start: usize,
        count: usize,
        len: usize,
    },

    #[error("Corrupt row payload: {0}")]
    CorruptRow(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::QueryFailed(err.to_string())
    }
}

/// The header row is missing columns the sync requires.
///
/// Resolved once at cycle start; the cycle never begins with a partial
/// schema.
#[derive(Error, Debug)]
#[error("Missing required columns: {}", .missing.join(", "))]
pub struct SchemaError {
    pub missing: Vec<String>,
}

/// One row whose end date precedes its start date.
#[derive(Debug, Clone, PartialEq)]
pub struct DateOrderIssue {
    /// Absolute table row (header is row 1, first data row is row 2).
    pub row: usize,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl std::fmt::Display for DateOrderIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let title = if self.title.trim().is_empty() {
            "(untitled)"
        } else {
            self.title.trim()
        };
        write!(
            f,
            "row {}: {} -- end {} < start {}",
            self.row,
            title,
            fmt_cell_datetime(self.end),
            fmt_cell_datetime(self.start),
        )
    }
}

/// Render a table datetime the way the table shows it: date-only values
/// without a time component.
fn fmt_cell_datetime(dt: NaiveDateTime) -> String {
    if dt.time() == chrono::NaiveTime::MIN {
        dt.format("%d/%m/%y").to_string()
    } else {
        dt.format("%d/%m/%y %H:%M").to_string()
    }
}

/// Pre-sync validation failed; nothing was mutated.
#[derive(Debug)]
pub struct ValidationError {
    pub issues: Vec<DateOrderIssue>,
}

impl std::error::Error for ValidationError {}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const MAX_SHOWN: usize = 50;
        writeln!(f, "End date must be on or after the start date:")?;
        for issue in self.issues.iter().take(MAX_SHOWN) {
            writeln!(f, "  {issue}")?;
        }
        if self.issues.len() > MAX_SHOWN {
            writeln!(f, "  ... and {} more", self.issues.len() - MAX_SHOWN)?;
        }
        write!(f, "Fix the rows above and run the sync again.")
    }
}

/// Calendar service errors, classified at the client boundary.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The service rejected the call as over quota. Retried exactly once
    /// after a cooldown; a second failure is fatal for the cycle.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Referenced calendar or event does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The resource existed but was already deleted. Swallowed where
    /// deletion is idempotent.
    #[error("already gone: {0}")]
    Gone(String),

    /// Authentication is missing or was rejected.
    #[error("authentication: {0}")]
    Auth(String),

    #[error("service returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed event payload: {0}")]
    Decode(String),
}

impl ServiceError {
    /// Whether the call may be retried after a cooldown.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::RateLimited(_))
    }

    /// Whether the target was already absent.
    pub fn is_gone(&self) -> bool {
        matches!(self, ServiceError::Gone(_) | ServiceError::NotFound(_))
    }
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// OAuth errors.
#[derive(Error, Debug)]
pub enum OAuthError {
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Access token expired and no refresh token available")]
    TokenExpired,

    #[error("Not authenticated with {service}")]
    NotAuthenticated { service: String },

    #[error("OAuth credentials not configured for {service}")]
    CredentialsNotConfigured { service: String },

    #[error("Credential store error: {0}")]
    Keyring(String),
}

impl From<keyring::Error> for OAuthError {
    fn from(err: keyring::Error) -> Self {
        OAuthError::Keyring(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
