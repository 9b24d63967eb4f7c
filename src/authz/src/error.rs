//! Error types for the authorization engine
//!
//! Every failure path ends in a deny or in one of these errors. Nothing in the
//! engine converts an error into an allow.

use crate::types::ResourceType;
use thiserror::Error;

/// Fatal setup or admin-write errors: the engine is misconfigured.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Permission name not present in the registry
    #[error("Unknown permission: {0}")]
    UnknownPermission(String),

    /// Permission registered twice
    #[error("Duplicate permission: {0}")]
    DuplicatePermission(String),

    /// Confidentiality level string outside the fixed vocabulary
    #[error("Unknown confidentiality level: {0}")]
    UnknownConfidentialityLevel(String),

    /// Resource type string outside the fixed vocabulary
    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    /// Role referenced by a grant does not exist
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Any other invalid configuration value
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Resource attributes could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The upstream registry does not know the resource
    #[error("{resource_type} not found: {url}")]
    NotFound {
        resource_type: ResourceType,
        url: String,
    },

    /// The upstream registry could not be reached or answered with an error
    #[error("{resource_type} lookup unavailable for {url}: {reason}")]
    Unavailable {
        resource_type: ResourceType,
        url: String,
        reason: String,
    },
}

impl LookupError {
    /// Whether the resource is known not to exist (callers usually treat this as forbidden)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A blueprint policy payload failed structural validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyValidationError {
    /// Payload is not an object of the expected shape
    #[error("Malformed policy: {0}")]
    Malformed(String),

    /// A required field is absent
    #[error("Missing policy field: {0}")]
    MissingField(&'static str),

    /// A field is present but its value is unacceptable
    #[error("Invalid policy field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Policy shape belongs to a different resource type
    #[error("Policy for {found} cannot be used on {expected}")]
    ResourceTypeMismatch {
        expected: ResourceType,
        found: ResourceType,
    },
}

/// Authorization engine errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Misconfiguration (unknown permission, level, role, ...)
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Resource attribute lookup failed
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// Policy rejected at write time
    #[error(transparent)]
    PolicyValidation(#[from] PolicyValidationError),

    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_error_classification() {
        let missing = LookupError::NotFound {
            resource_type: ResourceType::Case,
            url: "https://cases.example.com/cases/1".to_string(),
        };
        assert!(missing.is_not_found());

        let down = LookupError::Unavailable {
            resource_type: ResourceType::Document,
            url: "https://docs.example.com/documents/1".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(!down.is_not_found());
        assert!(down.to_string().contains("connection refused"));
    }

    #[test]
    fn test_wrapped_errors_keep_message() {
        let err: AuthzError = ConfigurationError::UnknownPermission("cases:fly".to_string()).into();
        assert_eq!(err.to_string(), "Unknown permission: cases:fly");
    }
}
