//! Core data models for the bucket inventory.
//!
//! These types describe path-addressed objects, the raw records a listing
//! produces, and the reconciled per-key aggregates built from them. They
//! serialize naturally via `serde`.

pub mod aggregate;
pub mod path_object;
pub mod version;

pub use aggregate::{CurrentState, FileObjectAggregate, IncompleteAggregate};
pub use path_object::{DEFAULT_DELIMITER, PathObject, PathObjectBuilder, PathObjectError};
pub use version::{
    InvalidRecord, MIN_BILLABLE_SIZE, NULL_VERSION_ID, RawObjectRecord, RawVersionRecord, SourceRecord,
    StorageClass, VersionRecord,
};
