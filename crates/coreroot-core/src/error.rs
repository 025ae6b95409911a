use thiserror::Error;

/// Core error types for CoreRoot operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid resource kind: {0}")]
    InvalidResourceKind(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new InvalidResourceKind error
    #[must_use]
    pub fn invalid_resource_kind(kind: impl Into<String>) -> Self {
        Self::InvalidResourceKind(kind.into())
    }

    /// Create a new InvalidId error
    #[must_use]
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId(id.into())
    }

    /// Check if this error was caused by bad caller input
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidResourceKind(_) | Self::InvalidId(_))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::invalid_resource_kind("Widget");
        assert_eq!(err.to_string(), "Invalid resource kind: Widget");

        let err = CoreError::invalid_id("not-a-uuid");
        assert_eq!(err.to_string(), "Invalid identifier: not-a-uuid");
    }

    #[test]
    fn test_client_error_classification() {
        assert!(CoreError::invalid_id("x").is_client_error());
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!CoreError::from(json_err).is_client_error());
    }
}
