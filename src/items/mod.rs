//! Revisioned item store
//!
//! Snapshots are immutable and keyed by generation token. Each item keeps a
//! pointer per numeric revision (to the newest token generated for it) and a
//! latest pointer. The store never renders; a [`Lookup::Miss`] is the
//! signal for the render pipeline.

mod errors;
mod snapshot;
mod store;

pub use errors::{ItemError, ItemResult};
pub use snapshot::{ItemKey, LatestPointer, Snapshot};
pub use store::{ItemStore, Lookup, PutOutcome, RenderedContent};
