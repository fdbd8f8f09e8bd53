//! A previously rebuilt cache store, read without contacting the original source.

use super::{RecordStream, RepositorySource};
use crate::{
    errors::{SourceError, SourceResult},
    models::SourceRecord,
    services::cache_store::CacheStore,
};
use async_trait::async_trait;
use futures::{StreamExt, stream};

/// Yields one plain record per cache row. Rows carry no history, so every
/// key reconciles to a single version.
#[derive(Clone, Debug)]
pub struct CachedSource {
    store: CacheStore,
    name: String,
}

impl CachedSource {
    pub fn new(store: CacheStore, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }
}

#[async_trait]
impl RepositorySource for CachedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_versions(&self) -> bool {
        false
    }

    async fn list(&self) -> SourceResult<RecordStream> {
        let rows = self
            .store
            .load_rows(&self.name)
            .await
            .map_err(|err| SourceError::Cache(Box::new(err)))?;
        let records = rows
            .into_iter()
            .map(|row| Ok(SourceRecord::Object(row.into())));
        Ok(stream::iter(records).boxed())
    }
}
