//! Storage error types for the resource store abstraction.

use std::fmt;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested resource was not found.
    #[error("Resource not found: {resource_type}/{id}")]
    NotFound {
        /// The kind of resource that was not found.
        resource_type: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Attempted to create something that must be unique and already exists.
    #[error("Resource already exists: {resource_type}/{id}")]
    AlreadyExists {
        /// The kind of resource that already exists.
        resource_type: String,
        /// The conflicting value.
        id: String,
    },

    /// The resource data is invalid.
    #[error("Invalid resource: {message}")]
    InvalidResource {
        /// Description of why the resource is invalid.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Creates a new `InvalidResource` error.
    #[must_use]
    pub fn invalid_resource(message: impl Into<String>) -> Self {
        Self::InvalidResource {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is an already exists error.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::InvalidResource { .. } => ErrorCategory::Validation,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Resource not found.
    NotFound,
    /// Uniqueness conflict.
    Conflict,
    /// Validation error.
    Validation,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("post", "123");
        assert_eq!(err.to_string(), "Resource not found: post/123");

        let err = StorageError::already_exists("user", "a@example.com");
        assert_eq!(err.to_string(), "Resource already exists: user/a@example.com");

        let err = StorageError::invalid_resource("body must be an object");
        assert_eq!(err.to_string(), "Invalid resource: body must be an object");
    }

    #[test]
    fn test_error_predicates() {
        assert!(StorageError::not_found("post", "1").is_not_found());
        assert!(!StorageError::internal("boom").is_not_found());
        assert!(StorageError::already_exists("user", "x").is_already_exists());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::not_found("post", "1").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            StorageError::internal("disk full").category(),
            ErrorCategory::Internal
        );
        assert_eq!(ErrorCategory::Conflict.to_string(), "conflict");
    }
}
