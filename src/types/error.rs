//! Error types for Vigil
//!
//! One flat enum with string payloads and `From` conversions for the
//! libraries we call into.

/// Main error type for Vigil operations
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    /// Bad threshold/count parameters, empty input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Malformed envelope or blob (too short, bad prefix, bad encoding)
    #[error("Format error: {0}")]
    Format(String),

    /// Authenticated decryption or integrity check failed.
    ///
    /// Wrong key and tampering are reported identically.
    #[error("Decryption failed")]
    Crypto,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Time-lock not ready: round {current_round} < {target_round}")]
    TimelockNotReady { target_round: u64, current_round: u64 },

    #[error("Access code expired")]
    Expired,

    #[error("Access code already used")]
    AlreadyUsed,

    #[error("Access code locked after too many attempts")]
    Locked,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VigilError {
    /// Whether the system may retry the failed operation on its own.
    ///
    /// Crypto and format errors mean corruption or a logic bug and are
    /// always surfaced to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Notification(_))
    }
}

impl From<serde_json::Error> for VigilError {
    fn from(err: serde_json::Error) -> Self {
        Self::Format(format!("JSON error: {}", err))
    }
}

impl From<base64::DecodeError> for VigilError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Format(format!("base64 error: {}", err))
    }
}

impl From<reqwest::Error> for VigilError {
    fn from(err: reqwest::Error) -> Self {
        Self::Notification(err.to_string())
    }
}

/// Result type alias for Vigil operations
pub type Result<T> = std::result::Result<T, VigilError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(VigilError::Storage("timeout".into()).is_retryable());
        assert!(VigilError::Notification("503".into()).is_retryable());
        assert!(!VigilError::Crypto.is_retryable());
        assert!(!VigilError::Format("short".into()).is_retryable());
        assert!(!VigilError::Locked.is_retryable());
    }

    #[test]
    fn test_crypto_error_does_not_leak_cause() {
        assert_eq!(VigilError::Crypto.to_string(), "Decryption failed");
    }
}
