//! Domain and bucket registry
//!
//! A domain groups buckets; a bucket has a kind that fixes which properties
//! its items have and whether misses are rendered.

mod bucket;
mod errors;
mod kind;

pub use bucket::{parse_bucket_spec, BucketRecord, BucketRegistry, Created, DomainRecord};
pub use errors::{RegistryError, RegistryResult};
pub use kind::{media_type_essence, BucketKind, Capabilities, PropertySpec};
