//! Identity errors

use thiserror::Error;

/// Result type for identifier parsing
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Identifier parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// Segment is neither a revision number nor a token
    #[error("Not a revision id: {0}")]
    NotARevision(String),

    /// Segment looks like a token but does not parse
    #[error("Invalid generation token: {0}")]
    InvalidToken(String),

    /// The minter has reached the last timestamp a version-1 token can hold
    #[error("Generation token timestamps exhausted")]
    TokensExhausted,
}
