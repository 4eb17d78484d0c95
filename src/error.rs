/// Error types for the catalog
///
/// Only the storage, configuration and command-line layers can fail.
/// Identifier helpers and the in-memory attachment index are total and
/// report "not found" through `false`, `None` or an empty `Vec`.

use thiserror::Error;

/// Catalog-wide error type
#[derive(Error, Debug)]
pub enum CatalogError {
    /// SQLite errors (auto-converted from rusqlite::Error)
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored data that cannot be decoded back into a record
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Result type alias for catalog errors
pub type CatalogResult<T> = Result<T, CatalogError>;

impl CatalogError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}
