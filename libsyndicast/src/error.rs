//! Error types for Syndicast

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyndicastError>;

#[derive(Error, Debug)]
pub enum SyndicastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Article source error: {0}")]
    Source(#[from] SourceError),

    #[error("Content generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Timed out after {}", format_timeout(.0))]
    Timeout(Duration),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

fn format_timeout(timeout: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*timeout)
}

impl SyndicastError {
    /// Returns the appropriate exit code for this error
    ///
    /// Configuration problems abort before any pipeline runs and exit with 2.
    pub fn exit_code(&self) -> i32 {
        match self {
            SyndicastError::Config(_) => 2,
            SyndicastError::Source(_) => 1,
            SyndicastError::Generation(_) => 1,
            SyndicastError::Platform(_) => 1,
            SyndicastError::Timeout(_) => 1,
            SyndicastError::InvalidInput(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Request failed: {0}")]
    Http(String),

    #[error("Datastore returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode article: {0}")]
    Decode(String),

    #[error("Article not found: {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Request failed: {0}")]
    Http(String),

    #[error("Generator returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Generator returned an empty response")]
    EmptyResponse,

    #[error("Malformed generator response: {0}")]
    Malformed(String),

    #[error("Article has no usable text")]
    NoSourceText,
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),
}

impl PlatformError {
    /// Whether this failure means the cached session should be dropped
    pub fn is_authentication(&self) -> bool {
        matches!(self, PlatformError::Authentication(_))
    }
}
