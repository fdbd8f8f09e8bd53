//! A bucket in a remote object store, listed through an SDK collaborator.

use super::{RecordStream, RepositorySource};
use crate::{
    errors::SourceResult,
    models::{RawObjectRecord, RawVersionRecord, SourceRecord},
};
use async_trait::async_trait;
use futures::{StreamExt, stream::BoxStream};
use tracing::info;

/// The remote listing capability the inventory relies on.
///
/// Implementations own pagination and retries; each stream must yield every
/// entry of the bucket exactly once.
#[async_trait]
pub trait ObjectLister: Send + Sync {
    /// Whether versioning is enabled on `bucket`.
    async fn versioning_enabled(&self, bucket: &str) -> SourceResult<bool>;

    /// Every version and delete marker in `bucket`.
    fn list_versions(&self, bucket: &str) -> BoxStream<'static, SourceResult<RawVersionRecord>>;

    /// Every current object in `bucket`.
    fn list_objects(&self, bucket: &str) -> BoxStream<'static, SourceResult<RawObjectRecord>>;
}

pub struct RemoteSource<L> {
    bucket: String,
    lister: L,
    versioning: bool,
}

impl<L: ObjectLister> RemoteSource<L> {
    /// Ask the collaborator once whether `bucket` is versioned and remember it.
    pub async fn connect(bucket: impl Into<String>, lister: L) -> SourceResult<Self> {
        let bucket = bucket.into();
        let versioning = lister.versioning_enabled(&bucket).await?;
        info!("bucket `{}` versioning enabled: {}", bucket, versioning);
        Ok(Self {
            bucket,
            lister,
            versioning,
        })
    }
}

#[async_trait]
impl<L: ObjectLister> RepositorySource for RemoteSource<L> {
    fn name(&self) -> &str {
        &self.bucket
    }

    fn supports_versions(&self) -> bool {
        self.versioning
    }

    async fn list(&self) -> SourceResult<RecordStream> {
        let stream = if self.versioning {
            self.lister
                .list_versions(&self.bucket)
                .map(|r| r.map(SourceRecord::Version))
                .boxed()
        } else {
            self.lister
                .list_objects(&self.bucket)
                .map(|r| r.map(SourceRecord::Object))
                .boxed()
        };
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::SourceError, models::StorageClass, services::sources::reconcile};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    /// Serves a fixed listing and counts versioning queries.
    struct FixedLister {
        versioning: bool,
        versions: Vec<RawVersionRecord>,
        objects: Vec<RawObjectRecord>,
        versioning_queries: AtomicUsize,
    }

    impl FixedLister {
        fn versioned(versions: Vec<RawVersionRecord>) -> Self {
            Self {
                versioning: true,
                versions,
                objects: Vec::new(),
                versioning_queries: AtomicUsize::new(0),
            }
        }

        fn plain(objects: Vec<RawObjectRecord>) -> Self {
            Self {
                versioning: false,
                versions: Vec::new(),
                objects,
                versioning_queries: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ObjectLister for FixedLister {
        async fn versioning_enabled(&self, bucket: &str) -> SourceResult<bool> {
            if bucket == "missing" {
                return Err(SourceError::listing(bucket, "NoSuchBucket"));
            }
            self.versioning_queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.versioning)
        }

        fn list_versions(&self, _bucket: &str) -> BoxStream<'static, SourceResult<RawVersionRecord>> {
            stream::iter(self.versions.clone().into_iter().map(Ok)).boxed()
        }

        fn list_objects(&self, _bucket: &str) -> BoxStream<'static, SourceResult<RawObjectRecord>> {
            stream::iter(self.objects.clone().into_iter().map(Ok)).boxed()
        }
    }

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 3, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn version(key: &str, id: &str, at: i64, size: Option<i64>, latest: bool) -> RawVersionRecord {
        RawVersionRecord {
            key: key.into(),
            version_id: id.into(),
            timestamp: t(at),
            size,
            is_latest: latest,
            storage_class: StorageClass::Standard,
        }
    }

    #[tokio::test]
    async fn versioned_bucket_yields_version_history() {
        let lister = FixedLister::versioned(vec![
            version("a", "1", 1, Some(100), false),
            version("b", "1", 1, None, true),
            version("a", "2", 2, Some(200), true),
        ]);
        let source = RemoteSource::connect("bucket1", lister).await.unwrap();
        assert!(source.supports_versions());
        assert_eq!(source.name(), "bucket1");

        let map = reconcile(&source, &CancellationToken::new()).await.unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a").unwrap().version_count(), 2);
        assert_eq!(map.get("a").unwrap().current_size().unwrap(), 200);
        assert!(map.get("b").unwrap().is_deleted().unwrap());
    }

    #[tokio::test]
    async fn plain_bucket_yields_single_versions() {
        let lister = FixedLister::plain(vec![RawObjectRecord {
            key: "logs/app.log".into(),
            timestamp: t(3),
            size: 77,
            storage_class: StorageClass::Glacier,
        }]);
        let source = RemoteSource::connect("archive", lister).await.unwrap();
        assert!(!source.supports_versions());

        let map = reconcile(&source, &CancellationToken::new()).await.unwrap();
        let log = map.get("logs/app.log").unwrap();
        assert_eq!(log.version_count(), 1);
        assert_eq!(log.current_size().unwrap(), 77);
    }

    #[tokio::test]
    async fn versioning_is_queried_once_per_source() {
        let source = RemoteSource::connect("bucket1", FixedLister::versioned(Vec::new()))
            .await
            .unwrap();
        let _first = source.list().await.unwrap();
        let _second = source.list().await.unwrap();
        assert_eq!(source.lister.versioning_queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn connect_propagates_collaborator_errors() {
        let result = RemoteSource::connect("missing", FixedLister::versioned(Vec::new())).await;
        assert!(matches!(result, Err(SourceError::Listing { .. })));
    }
}
