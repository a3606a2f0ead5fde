//! Core error types for IDEMFAULT.

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A 32-bit word could not be parsed
    #[error("Invalid word '{input}': {reason}")]
    InvalidWord {
        /// Text that failed to parse
        input: String,
        /// Why it failed
        reason: String,
    },

    /// Invalid output hash
    #[error("Invalid hash '{input}': {reason}")]
    InvalidHash {
        /// Text that failed to parse
        input: String,
        /// Why it failed
        reason: String,
    },

    /// Unknown memory space name
    #[error("Unknown memory space: {0}")]
    UnknownSpace(String),

    /// Unknown access kind
    #[error("Unknown access kind: {0}")]
    UnknownAccess(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::UnknownSpace("Rom".to_string());
        assert_eq!(format!("{}", err), "Unknown memory space: Rom");

        let err = CoreError::InvalidWord {
            input: "0xZZ".to_string(),
            reason: "invalid digit".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("0xZZ"));
        assert!(s.contains("invalid digit"));
    }

    #[test]
    fn test_error_equality() {
        let err1 = CoreError::UnknownAccess("fetch".to_string());
        let err2 = CoreError::UnknownAccess("fetch".to_string());
        assert_eq!(err1, err2);
        assert_ne!(err1, CoreError::UnknownSpace("fetch".to_string()));
    }
}
