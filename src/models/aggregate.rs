//! Reconciled per-key view: current state plus full version history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::version::{StorageClass, VersionRecord};

/// No version marked latest has been observed for this key yet.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("object `{key}` has {version_count} version(s) but none marked latest")]
pub struct IncompleteAggregate {
    pub key: String,
    pub version_count: usize,
}

/// State of an object as declared by its latest version.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentState {
    pub timestamp: DateTime<Utc>,
    /// 0 when the latest version is a delete marker.
    pub size: i64,
    pub is_deleted: bool,
    pub storage_class: StorageClass,
}

/// All versions observed for a single key.
///
/// `current` tracks the version whose `is_latest` flag is set. A key whose
/// listing never delivered such a version stays unresolved and every
/// accessor for the current state returns [`IncompleteAggregate`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileObjectAggregate {
    key: String,
    current: Option<CurrentState>,
    versions: Vec<VersionRecord>,
}

impl FileObjectAggregate {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            current: None,
            versions: Vec::new(),
        }
    }

    /// Fold one more version into this aggregate.
    pub fn add_version(&mut self, version: VersionRecord) {
        if version.is_latest {
            self.current = Some(CurrentState {
                timestamp: version.timestamp,
                size: version.size_or_zero(),
                is_deleted: version.is_delete_marker(),
                storage_class: version.storage_class,
            });
        }
        self.versions.push(version);
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    pub fn is_resolved(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Result<&CurrentState, IncompleteAggregate> {
        self.current.as_ref().ok_or_else(|| IncompleteAggregate {
            key: self.key.clone(),
            version_count: self.versions.len(),
        })
    }

    pub fn current_size(&self) -> Result<i64, IncompleteAggregate> {
        self.current().map(|c| c.size)
    }

    pub fn current_timestamp(&self) -> Result<DateTime<Utc>, IncompleteAggregate> {
        self.current().map(|c| c.timestamp)
    }

    pub fn is_deleted(&self) -> Result<bool, IncompleteAggregate> {
        self.current().map(|c| c.is_deleted)
    }

    /// Versions in ingestion order.
    pub fn versions(&self) -> &[VersionRecord] {
        &self.versions
    }

    /// Versions newest first by timestamp; equal timestamps keep ingestion order.
    pub fn versions_newest_first(&self) -> Vec<&VersionRecord> {
        let mut ordered: Vec<&VersionRecord> = self.versions.iter().collect();
        ordered.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.sequence.cmp(&b.sequence))
        });
        ordered
    }

    pub fn delete_marker_count(&self) -> usize {
        self.versions.iter().filter(|v| v.is_delete_marker()).count()
    }

    /// Bytes billed for every stored version of this key.
    pub fn billable_size(&self) -> i64 {
        self.versions.iter().map(VersionRecord::billable_size).sum()
    }
}
