//! Inventory of versioned object stores and local directory trees.
//!
//! A [`RepositorySource`] enumerates raw records, the
//! [`VersionedObjectIndex`] folds them into one [`FileObjectAggregate`] per
//! key, and the [`CacheStore`] persists the resolved state so later runs can
//! skip the remote enumeration.

pub mod config;
pub mod errors;
pub mod models;
pub mod services;

pub use errors::{CacheError, CacheResult, SourceError, SourceResult};
pub use models::{FileObjectAggregate, PathObject, RawObjectRecord, RawVersionRecord, SourceRecord};
pub use services::{
    cache_store::{CacheRow, CacheStore},
    object_index::{InventorySummary, ObjectMap, SharedIndex, VersionedObjectIndex},
    sources::{CachedSource, LocalSource, ObjectLister, RemoteSource, RepositorySource, reconcile},
};
