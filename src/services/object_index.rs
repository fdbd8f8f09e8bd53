//! src/services/object_index.rs
//!
//! VersionedObjectIndex folds a flat, unordered stream of version records
//! (one per object version, keys repeating arbitrarily) into one
//! `FileObjectAggregate` per key. Ingestion is strictly sequential; callers
//! that enumerate concurrently go through `SharedIndex`, which admits one
//! ingest at a time.

use crate::{
    errors::{SourceError, SourceResult},
    models::{
        FileObjectAggregate, IncompleteAggregate, InvalidRecord, RawObjectRecord, RawVersionRecord,
        SourceRecord, VersionRecord,
    },
};
use futures::{Stream, StreamExt, pin_mut};
use parking_lot::Mutex;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Aggregates keyed by object key, iterated in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectMap {
    objects: Vec<FileObjectAggregate>,
    positions: HashMap<String, usize>,
}

impl ObjectMap {
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&FileObjectAggregate> {
        self.positions.get(key).map(|&pos| &self.objects[pos])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.objects.iter().map(FileObjectAggregate::key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileObjectAggregate> {
        self.objects.iter()
    }

    /// Total number of versions folded into all aggregates.
    pub fn version_count(&self) -> usize {
        self.objects.iter().map(FileObjectAggregate::version_count).sum()
    }

    /// Aggregates whose listing never delivered a latest version.
    pub fn unresolved(&self) -> impl Iterator<Item = &FileObjectAggregate> {
        self.objects.iter().filter(|agg| !agg.is_resolved())
    }

    /// Fail with the first aggregate that has no latest version.
    pub fn ensure_resolved(&self) -> Result<(), IncompleteAggregate> {
        match self.unresolved().next() {
            Some(agg) => agg.current().map(|_| ()),
            None => Ok(()),
        }
    }

    pub fn summary(&self) -> InventorySummary {
        let mut summary = InventorySummary {
            objects: self.objects.len(),
            ..InventorySummary::default()
        };
        for agg in &self.objects {
            summary.versions += agg.version_count();
            summary.delete_markers += agg.delete_marker_count();
            summary.billable_bytes += agg.billable_size();
            match agg.current() {
                Ok(current) if current.is_deleted => summary.deleted_objects += 1,
                Ok(current) => summary.current_bytes += current.size,
                Err(_) => summary.unresolved += 1,
            }
        }
        summary
    }

    fn entry(&mut self, key: &str) -> &mut FileObjectAggregate {
        let pos = match self.positions.get(key) {
            Some(&pos) => pos,
            None => {
                let pos = self.objects.len();
                self.objects.push(FileObjectAggregate::new(key));
                self.positions.insert(key.to_string(), pos);
                pos
            }
        };
        &mut self.objects[pos]
    }
}

impl IntoIterator for ObjectMap {
    type Item = FileObjectAggregate;
    type IntoIter = std::vec::IntoIter<FileObjectAggregate>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.into_iter()
    }
}

impl<'a> IntoIterator for &'a ObjectMap {
    type Item = &'a FileObjectAggregate;
    type IntoIter = std::slice::Iter<'a, FileObjectAggregate>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}

/// Totals over an [`ObjectMap`] used for storage audits.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InventorySummary {
    pub objects: usize,
    pub versions: usize,
    pub delete_markers: usize,
    /// Objects whose latest version is a delete marker.
    pub deleted_objects: usize,
    /// Objects with no latest version observed.
    pub unresolved: usize,
    /// Sum of current sizes of objects that are not deleted.
    pub current_bytes: i64,
    /// Billable bytes across every stored version. A map loaded from the
    /// cache holds only current versions, so this then covers those alone.
    pub billable_bytes: i64,
}

/// Folds raw records into per-key aggregates.
///
/// Does not deduplicate by version id: re-ingesting the same
/// `(key, version_id)` adds a second version.
#[derive(Debug, Default)]
pub struct VersionedObjectIndex {
    map: ObjectMap,
    next_sequence: u64,
}

impl VersionedObjectIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one entry of a versioned listing.
    ///
    /// A record with a negative size is rejected and leaves the index unchanged.
    pub fn ingest(&mut self, raw: RawVersionRecord) -> Result<(), InvalidRecord> {
        raw.validate()?;
        let sequence = self.bump_sequence();
        let key = raw.key.clone();
        self.map
            .entry(&key)
            .add_version(VersionRecord::from_raw(raw, sequence));
        Ok(())
    }

    /// Fold one entry of a plain listing; it is always the latest version.
    pub fn ingest_object(&mut self, raw: RawObjectRecord) -> Result<(), InvalidRecord> {
        raw.validate()?;
        let sequence = self.bump_sequence();
        let key = raw.key.clone();
        self.map
            .entry(&key)
            .add_version(VersionRecord::from_object(raw, sequence));
        Ok(())
    }

    pub fn ingest_record(&mut self, record: SourceRecord) -> Result<(), InvalidRecord> {
        match record {
            SourceRecord::Version(raw) => self.ingest(raw),
            SourceRecord::Object(raw) => self.ingest_object(raw),
        }
    }

    /// Drain `stream` into the index until it ends or `cancel` fires.
    ///
    /// Returns the number of records folded. On cancellation or a stream
    /// error the records folded so far stay in the index.
    pub async fn ingest_stream<S>(&mut self, stream: S, cancel: &CancellationToken) -> SourceResult<u64>
    where
        S: Stream<Item = SourceResult<SourceRecord>>,
    {
        pin_mut!(stream);
        let mut ingested = 0u64;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("enumeration cancelled after {} record(s)", ingested);
                    return Err(SourceError::Cancelled { ingested });
                }
                next = stream.next() => next,
            };
            match next {
                Some(record) => {
                    self.ingest_record(record?)?;
                    ingested += 1;
                }
                None => break,
            }
        }
        debug!("ingested {} record(s) into {} object(s)", ingested, self.map.len());
        Ok(ingested)
    }

    /// Number of records folded so far.
    pub fn record_count(&self) -> u64 {
        self.next_sequence
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&FileObjectAggregate> {
        self.map.get(key)
    }

    pub fn finalize(self) -> ObjectMap {
        self.map
    }

    fn bump_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }
}

/// A [`VersionedObjectIndex`] shared between concurrent enumeration tasks.
///
/// Every ingest holds the lock for the whole read-modify-write of its
/// aggregate, so only one record is folded at a time.
#[derive(Clone, Debug, Default)]
pub struct SharedIndex {
    inner: Arc<Mutex<VersionedObjectIndex>>,
}

impl SharedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest_record(&self, record: SourceRecord) -> Result<(), InvalidRecord> {
        self.inner.lock().ingest_record(record)
    }

    pub fn record_count(&self) -> u64 {
        self.inner.lock().record_count()
    }

    /// Take the accumulated mapping, leaving an empty index behind for any
    /// remaining clones.
    pub fn finalize(self) -> ObjectMap {
        std::mem::take(&mut *self.inner.lock()).finalize()
    }
}
