// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for provisioning operations

use thiserror::Error;

use crate::domain::{ArnError, NetworkError, TagError};

/// Errors that can occur while building or applying the resource graph
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// Configuration error (environment, account, region, anchor identifier)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Federation anchor could not be resolved
    #[error("Federation anchor not found: {0}")]
    AnchorNotFound(String),

    /// Graph ordering or identity violation
    #[error("Structural error: {0}")]
    Structural(String),

    /// A stack rejected its inputs while being constructed
    #[error("Construction error in {stack}: {reason}")]
    Construction { stack: String, reason: String },

    /// Rejection reported by the provisioning engine
    #[error("Provider rejected the request: {0}")]
    Provider(String),

    /// Provisioning engine exited unsuccessfully
    #[error("Provisioning engine exited with status {code}")]
    Engine { code: i32 },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Filesystem or process error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for provisioning operations
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

impl ProvisioningError {
    /// Create a construction error for the named stack
    pub fn construction(stack: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Construction {
            stack: stack.into(),
            reason: reason.into(),
        }
    }

    /// Process exit code this error should terminate the run with
    ///
    /// Engine failures propagate the engine's own status unchanged.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Engine { code } => *code,
            _ => 1,
        }
    }
}

impl From<serde_json::Error> for ProvisioningError {
    fn from(err: serde_json::Error) -> Self {
        ProvisioningError::Serialization(err.to_string())
    }
}

impl From<NetworkError> for ProvisioningError {
    fn from(err: NetworkError) -> Self {
        ProvisioningError::Configuration(err.to_string())
    }
}

impl From<ArnError> for ProvisioningError {
    fn from(err: ArnError) -> Self {
        ProvisioningError::Configuration(err.to_string())
    }
}

impl From<TagError> for ProvisioningError {
    fn from(err: TagError) -> Self {
        ProvisioningError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_exit_code_propagates() {
        assert_eq!(ProvisioningError::Engine { code: 3 }.exit_code(), 3);
        assert_eq!(
            ProvisioningError::Configuration("bad".into()).exit_code(),
            1
        );
    }

    #[test]
    fn test_domain_errors_are_configuration_errors() {
        let err: ProvisioningError = NetworkError::InvalidCidr("x".into()).into();
        assert!(matches!(err, ProvisioningError::Configuration(_)));
    }
}
