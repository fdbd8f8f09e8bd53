//! Raw listing records and the per-version facts folded from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use super::path_object::PathObject;

/// Version identifier assigned to objects of a bucket without versioning.
pub const NULL_VERSION_ID: &str = "null";

/// Objects in the infrequent-access classes are billed at no less than this size.
pub const MIN_BILLABLE_SIZE: i64 = 128 * 1024;

/// A listing entry that cannot be folded into the index.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("record for `{key}` has negative size {size}")]
pub struct InvalidRecord {
    pub key: String,
    pub size: i64,
}

/// Storage class of an object version.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageClass {
    #[default]
    Standard,
    ReducedRedundancy,
    Glacier,
    StandardIa,
    OnezoneIa,
    IntelligentTiering,
    DeepArchive,
}

impl StorageClass {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageClass::Standard => "STANDARD",
            StorageClass::ReducedRedundancy => "REDUCED_REDUNDANCY",
            StorageClass::Glacier => "GLACIER",
            StorageClass::StandardIa => "STANDARD_IA",
            StorageClass::OnezoneIa => "ONEZONE_IA",
            StorageClass::IntelligentTiering => "INTELLIGENT_TIERING",
            StorageClass::DeepArchive => "DEEP_ARCHIVE",
        }
    }

    /// Size billed for `size` bytes stored in this class.
    pub fn billable_size(self, size: i64) -> i64 {
        match self {
            StorageClass::StandardIa | StorageClass::OnezoneIa => size.max(MIN_BILLABLE_SIZE),
            _ => size,
        }
    }
}

impl FromStr for StorageClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STANDARD" => Ok(StorageClass::Standard),
            "REDUCED_REDUNDANCY" => Ok(StorageClass::ReducedRedundancy),
            "GLACIER" => Ok(StorageClass::Glacier),
            "STANDARD_IA" => Ok(StorageClass::StandardIa),
            "ONEZONE_IA" => Ok(StorageClass::OnezoneIa),
            "INTELLIGENT_TIERING" => Ok(StorageClass::IntelligentTiering),
            "DEEP_ARCHIVE" => Ok(StorageClass::DeepArchive),
            other => Err(format!("unknown storage class `{other}`")),
        }
    }
}

/// One entry of a versioned bucket listing.
///
/// `size = None` denotes a delete marker; a zero-byte object carries `Some(0)`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RawVersionRecord {
    pub key: String,
    pub version_id: String,
    pub timestamp: DateTime<Utc>,
    pub size: Option<i64>,
    pub is_latest: bool,
    #[serde(default)]
    pub storage_class: StorageClass,
}

/// One entry of a plain (non-versioned) listing: a bucket without versioning,
/// a filesystem walk or a cache row.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RawObjectRecord {
    pub key: String,
    pub timestamp: DateTime<Utc>,
    pub size: i64,
    #[serde(default)]
    pub storage_class: StorageClass,
}

impl RawVersionRecord {
    /// Sizes must be non-negative; `None` (a delete marker) always passes.
    pub fn validate(&self) -> Result<(), InvalidRecord> {
        match self.size {
            Some(size) if size < 0 => Err(InvalidRecord {
                key: self.key.clone(),
                size,
            }),
            _ => Ok(()),
        }
    }
}

impl RawObjectRecord {
    pub fn validate(&self) -> Result<(), InvalidRecord> {
        if self.size < 0 {
            return Err(InvalidRecord {
                key: self.key.clone(),
                size: self.size,
            });
        }
        Ok(())
    }
}

impl From<PathObject> for RawObjectRecord {
    fn from(obj: PathObject) -> Self {
        Self {
            timestamp: obj.timestamp(),
            size: obj.size(),
            key: obj.full_name().to_string(),
            storage_class: StorageClass::default(),
        }
    }
}

/// A record produced by a repository source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceRecord {
    Version(RawVersionRecord),
    Object(RawObjectRecord),
}

impl SourceRecord {
    pub fn key(&self) -> &str {
        match self {
            SourceRecord::Version(v) => &v.key,
            SourceRecord::Object(o) => &o.key,
        }
    }
}

/// A single historical or current state of an object.
///
/// Owned by its [`FileObjectAggregate`](super::aggregate::FileObjectAggregate);
/// `sequence` is the ingestion position used to break timestamp ties.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct VersionRecord {
    pub version_id: String,
    pub timestamp: DateTime<Utc>,
    pub size: Option<i64>,
    pub is_latest: bool,
    pub storage_class: StorageClass,
    pub sequence: u64,
}

impl VersionRecord {
    pub fn from_raw(raw: RawVersionRecord, sequence: u64) -> Self {
        Self {
            version_id: raw.version_id,
            timestamp: raw.timestamp,
            size: raw.size,
            is_latest: raw.is_latest,
            storage_class: raw.storage_class,
            sequence,
        }
    }

    /// A plain object is its own single, latest version.
    pub fn from_object(raw: RawObjectRecord, sequence: u64) -> Self {
        Self {
            version_id: NULL_VERSION_ID.to_string(),
            timestamp: raw.timestamp,
            size: Some(raw.size),
            is_latest: true,
            storage_class: raw.storage_class,
            sequence,
        }
    }

    pub fn is_delete_marker(&self) -> bool {
        self.size.is_none()
    }

    /// Size in bytes, 0 for a delete marker.
    pub fn size_or_zero(&self) -> i64 {
        self.size.unwrap_or(0)
    }

    pub fn billable_size(&self) -> i64 {
        match self.size {
            Some(size) => self.storage_class.billable_size(size),
            None => 0,
        }
    }
}
