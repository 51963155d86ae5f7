//! Error types for the tunnel server.
use thiserror::Error;

use vpn_core::error::ErrorCode;

pub type Result<T, E = ServerError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("tls: {0}")]
    Tls(String),
    #[error("protocol: {0}")]
    Protocol(#[from] vpn_core::Error),
    #[error("crypto: {0}")]
    Crypto(#[from] vpn_crypto::Error),
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    #[error("account disabled: {0}")]
    AccountDisabled(String),
    #[error("ip pool exhausted")]
    IpPoolExhausted,
    #[error("session limit reached for user {0}")]
    SessionLimitReached(String),
    #[error("duplicate session token")]
    DuplicateToken,
}

impl ServerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn tls(msg: impl Into<String>) -> Self {
        Self::Tls(msg.into())
    }

    /// Maps this error onto the wire-level code carried in `AuthFailure`
    /// (spec §7 scenarios S2/S3, §4.D allocation failures). Variants with
    /// no natural wire code (io/config/internal/tls/duplicate-token) fall
    /// back to a generic protocol code since they're never surfaced to a
    /// peer as an `AuthFailure`.
    pub fn auth_failure_code(&self) -> ErrorCode {
        match self {
            ServerError::AccountDisabled(_) => ErrorCode::UserDisabled,
            ServerError::SessionLimitReached(_) => ErrorCode::TooManySessions,
            ServerError::IpPoolExhausted => ErrorCode::IpAllocation,
            ServerError::AuthFailed(_) => ErrorCode::InvalidCredentials,
            _ => ErrorCode::InvalidMessage,
        }
    }
}
