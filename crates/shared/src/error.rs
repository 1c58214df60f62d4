//! Error types for the management API

use thiserror::Error;

/// Failures talking to the server management API
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ManagementError {
    /// Token exchange failed (transport, non-2xx status or undecodable body)
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Listing or metadata call failed
    #[error("Management API error: {0}")]
    Api(String),

    /// The server answered, but no routing domain is configured for it
    #[error("No domain assigned to server {0}")]
    NoDomainAssigned(String),
}

impl ManagementError {
    /// Returns true for a normal "unset" state rather than a failure
    pub fn is_unassigned(&self) -> bool {
        matches!(self, ManagementError::NoDomainAssigned(_))
    }
}

/// Result type for management API calls
pub type ManagementResult<T> = Result<T, ManagementError>;
