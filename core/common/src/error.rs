//! Common error types for PwSeal.

use thiserror::Error;

/// Top-level error type for PwSeal operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Token could not be decoded into the expected structure.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Token failed authentication.
    ///
    /// Carries no detail: a wrong password and a tampered token must look
    /// the same to the caller.
    #[error("Authentication failed")]
    Authentication,

    /// Token is authentic but outside the accepted age window.
    #[error("Token expired")]
    Expired,

    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Whether this error came from verifying or decoding a token.
    ///
    /// The CLI reports all of these with the same generic message.
    pub fn is_decrypt_failure(&self) -> bool {
        matches!(
            self,
            Error::MalformedToken(_) | Error::Authentication | Error::Expired
        )
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
