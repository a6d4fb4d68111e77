//! Error types for the policy model.
//!
//! The enforcement engine itself never fails: unknown resources resolve to
//! "no permission". Errors only arise when textual input (resource keys,
//! policy documents) cannot be turned into the model types.

use thiserror::Error;

/// Errors produced while reading policies and resource keys.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A resource key string could not be parsed.
    #[error("Invalid resource key '{key}': {reason}")]
    InvalidResourceKey { key: String, reason: String },

    /// A policy document is structurally invalid.
    #[error("Invalid policy document: {message}")]
    InvalidDocument { message: String },

    /// The policy document is not valid JSON.
    #[error("Policy JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PolicyError {
    /// Create an invalid resource key error
    pub fn invalid_resource_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResourceKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid document error
    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }
}

/// Result type alias for policy model operations
pub type Result<T> = std::result::Result<T, PolicyError>;
