//! Revision selectors
//!
//! Classifies the trailing path segment of an item request.

use std::fmt;

use super::errors::{IdentityError, IdentityResult};
use super::token::GenerationToken;

/// Which revision of an item a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selector {
    /// No revision segment: most recent revision, most recent token
    Latest,
    /// Externally assigned revision number
    Revision(u64),
    /// Exact snapshot
    Token(GenerationToken),
}

impl Selector {
    /// Classify an optional path segment.
    ///
    /// All digits → revision number, UUID-shaped → token, absent or empty →
    /// latest. Anything else is rejected.
    pub fn from_segment(segment: Option<&str>) -> IdentityResult<Self> {
        match segment {
            None | Some("") => Ok(Selector::Latest),
            Some(s) if s.bytes().all(|b| b.is_ascii_digit()) => s
                .parse::<u64>()
                .map(Selector::Revision)
                .map_err(|_| IdentityError::NotARevision(s.to_string())),
            Some(s) if GenerationToken::is_token_shaped(s) => {
                GenerationToken::parse(s).map(Selector::Token)
            }
            Some(s) => Err(IdentityError::NotARevision(s.to_string())),
        }
    }

    /// The revision number, if this selector names one.
    pub fn revision(&self) -> Option<u64> {
        match self {
            Selector::Revision(rev) => Some(*rev),
            _ => None,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Latest => write!(f, "latest"),
            Selector::Revision(rev) => write!(f, "{}", rev),
            Selector::Token(token) => write!(f, "{}", token),
        }
    }
}
