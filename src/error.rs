//! Custom error types for labsite.
//!
//! This module defines all error types used throughout the library.
//! All functions return `Result<T, LabsiteError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for labsite operations.
///
/// Uses `thiserror` for ergonomic error handling and automatic `Display` implementation.
#[derive(Debug, Error)]
pub enum LabsiteError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Document could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// Document does not exist at the given site path
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by external API
    #[error("Rate limited, retry after {0}s")]
    RateLimited(u64),

    /// External API returned an error
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: i32,
        /// Error message from API
        message: String,
    },

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// No member profile could be loaded
    #[error("No valid profiles found")]
    NoProfiles,
}

/// Result type alias using `LabsiteError`
pub type Result<T> = std::result::Result<T, LabsiteError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| LabsiteError::Parse(msg.to_string()))
    }
}
