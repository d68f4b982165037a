//! # Shop Error Types Module
//!
//! Error taxonomy shared by the navigation resolver, the conversation engine
//! and the data-access layer. Each variant maps to one recovery strategy at
//! the handler boundary.

/// Custom error types for storefront operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShopError {
    /// Bad step input; recovered locally by re-prompting
    Validation(String),
    /// Referenced category/product vanished between fetch and use
    NotFound(String),
    /// Storage write or read failed
    Persistence(String),
    /// Unknown menu state or malformed callback descriptor
    Configuration(String),
}

impl ShopError {
    /// Short machine-friendly tag used in log records
    pub fn kind(&self) -> &'static str {
        match self {
            ShopError::Validation(_) => "validation",
            ShopError::NotFound(_) => "not_found",
            ShopError::Persistence(_) => "persistence",
            ShopError::Configuration(_) => "configuration",
        }
    }
}

impl std::fmt::Display for ShopError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShopError::Validation(msg) => write!(f, "Validation error: {msg}"),
            ShopError::NotFound(msg) => write!(f, "Not found: {msg}"),
            ShopError::Persistence(msg) => write!(f, "Persistence error: {msg}"),
            ShopError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for ShopError {}

impl From<sqlx::Error> for ShopError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ShopError::NotFound("row not found".to_string()),
            other => ShopError::Persistence(other.to_string()),
        }
    }
}
