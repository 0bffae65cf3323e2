//! Error kinds shared by the gateway, publisher, orchestrator and supervisor.

use thiserror::Error;

/// Failure reported by a [`crate::gateway::RepositoryGateway`] call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The version token no longer matches the remote file.
    #[error("version conflict: {0}")]
    Conflict(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Errors that say nothing about the current candidate and will hit every
    /// following one too. Candidate scope does not contain these.
    pub fn escalates(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::RateLimited(_))
    }
}

#[derive(Error, Debug)]
pub enum HealerError {
    #[error("no credential found in GITHUB_TOKEN or TOKEN")]
    CredentialMissing,

    #[error("cycle aborted: {0}")]
    Fatal(#[from] GatewayError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, HealerError>;
