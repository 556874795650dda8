//! Identity scheme for stored content
//!
//! Two kinds of identifiers address a revision of an item:
//!
//! - **Revision numbers**: opaque, externally assigned integers. The store
//!   never generates them.
//! - **Generation tokens**: time-based UUIDs minted by the store (or pinned by
//!   a client). A token names exactly one snapshot, forever.
//!
//! A path segment is classified into a [`Selector`]; an absent segment means
//! "latest".

mod errors;
mod selector;
mod token;

pub use errors::{IdentityError, IdentityResult};
pub use selector::Selector;
pub use token::{GenerationToken, TokenMinter};
