//! A directory tree on the local filesystem (or a mounted share).

use super::{RecordStream, RepositorySource};
use crate::{
    errors::{SourceError, SourceResult},
    models::{DEFAULT_DELIMITER, PathObject, SourceRecord},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tracing::debug;
use walkdir::WalkDir;

/// Every regular file below `root` becomes one object keyed by its path
/// relative to `root`, segments joined with `delimiter`. Files have no
/// version history.
#[derive(Clone, Debug)]
pub struct LocalSource {
    name: String,
    root: PathBuf,
    delimiter: String,
}

impl LocalSource {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl RepositorySource for LocalSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_versions(&self) -> bool {
        false
    }

    async fn list(&self) -> SourceResult<RecordStream> {
        let root = self.root.clone();
        let delimiter = self.delimiter.clone();
        let records = tokio::task::spawn_blocking(move || walk(&root, &delimiter)).await??;
        Ok(stream::iter(records.into_iter().map(Ok)).boxed())
    }
}

/// Walk `root` in file-name order and stat every regular file.
fn walk(root: &Path, delimiter: &str) -> SourceResult<Vec<SourceRecord>> {
    let mut records = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let metadata = entry.metadata()?;
        let size = i64::try_from(metadata.len())
            .map_err(|_| io::Error::new(ErrorKind::InvalidData, "file size exceeds i64"))?;
        let timestamp: DateTime<Utc> = metadata.modified()?.into();

        let relative = path.strip_prefix(root).unwrap_or(path);
        let full_name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join(delimiter);

        let object = PathObject::builder()
            .full_name(full_name)
            .delimiter(delimiter)
            .size(size)
            .timestamp(timestamp)
            .build()
            .map_err(|source| SourceError::InvalidObject {
                path: path.to_path_buf(),
                source,
            })?;
        records.push(SourceRecord::Object(object.into()));
    }
    debug!("walked {}: {} file(s)", root.display(), records.len());
    Ok(records)
}
