//! Repository sources: anything that can enumerate the objects of one
//! container as a flat stream of [`SourceRecord`]s.
//!
//! - `RemoteSource` — a bucket listed through an [`ObjectLister`] collaborator
//! - `LocalSource` — a directory tree walked on the local filesystem
//! - `CachedSource` — the rows of a previously rebuilt cache store
//!
//! The stream is read once, front to back; call `list` again to re-enumerate.

pub mod cached;
pub mod local;
pub mod remote;

pub use cached::CachedSource;
pub use local::LocalSource;
pub use remote::{ObjectLister, RemoteSource};

use crate::{
    errors::SourceResult,
    models::SourceRecord,
    services::object_index::{ObjectMap, VersionedObjectIndex},
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub type RecordStream = BoxStream<'static, SourceResult<SourceRecord>>;

#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Name the source is known and cached under.
    fn name(&self) -> &str;

    /// Whether the source keeps a version history per key.
    fn supports_versions(&self) -> bool;

    /// Start a fresh enumeration of every record.
    async fn list(&self) -> SourceResult<RecordStream>;
}

/// Enumerate `source` and fold every record into a resolved mapping.
///
/// A cancelled or failed enumeration returns an error; the partial index is
/// dropped.
pub async fn reconcile(
    source: &dyn RepositorySource,
    cancel: &CancellationToken,
) -> SourceResult<ObjectMap> {
    let stream = source.list().await?;
    let mut index = VersionedObjectIndex::new();
    let ingested = index.ingest_stream(stream, cancel).await?;
    let map = index.finalize();
    info!(
        "listed `{}`: {} record(s), {} object(s)",
        source.name(),
        ingested,
        map.len()
    );
    Ok(map)
}
