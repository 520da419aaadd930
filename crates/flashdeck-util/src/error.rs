//! Error types for flashdeck

use thiserror::Error;

/// Core error type for flashdeck operations
#[derive(Debug, Error)]
pub enum FlashdeckError {
    /// Caller supplied something outside the accepted domain
    /// (unknown rating token, empty tag filter, malformed content)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Card or tag is absent, or belongs to another user
    #[error("Not found: {0}")]
    NotFound(String),

    /// A concurrent writer won the race for the same card
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Persistence is unavailable; retryable by the caller
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlashdeckError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn ipc(msg: impl Into<String>) -> Self {
        Self::IpcError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether a caller may reasonably retry the same request later
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::StorageError(_) | Self::RateLimited)
    }
}

pub type Result<T> = std::result::Result<T, FlashdeckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(FlashdeckError::conflict("card changed").is_transient());
        assert!(FlashdeckError::storage("disk gone").is_transient());
        assert!(!FlashdeckError::validation("bad rating").is_transient());
        assert!(!FlashdeckError::not_found("card").is_transient());
    }

    #[test]
    fn display_includes_message() {
        let err = FlashdeckError::validation("unknown rating 'meh'");
        assert_eq!(err.to_string(), "Validation error: unknown rating 'meh'");
    }
}
