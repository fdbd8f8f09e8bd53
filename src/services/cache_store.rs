//! src/services/cache_store.rs
//!
//! CacheStore — durable local projection of a repository source, one SQLite
//! file per source name beneath `cache_dir`. Only the resolved current state
//! of each key is kept (name, size, time, storage class); version history and
//! delete state are not persisted, so a load yields single-version aggregates.
//!
//! Rebuilds are atomic: the source is enumerated and folded completely in
//! memory, rows are written to a temporary database inside one transaction,
//! and the file is renamed over the previous store. Any failure removes the
//! temporary file and leaves the previous store untouched. Concurrent
//! rebuilds of the same source name must be serialized by the caller.

use crate::{
    errors::{CacheError, CacheResult},
    models::{RawObjectRecord, StorageClass},
    services::{
        object_index::{ObjectMap, VersionedObjectIndex},
        sources::{RepositorySource, reconcile},
    },
};
use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{
    FromRow, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &str = include_str!("../../migrations/0001_file_objects.sql");
const MAX_SOURCE_NAME_LEN: usize = 255;

/// One persisted object: the resolved current state of a key.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CacheRow {
    pub key: String,
    pub size: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub storage_class: StorageClass,
}

impl From<CacheRow> for RawObjectRecord {
    fn from(row: CacheRow) -> Self {
        Self {
            key: row.key,
            timestamp: row.timestamp,
            size: row.size,
            storage_class: row.storage_class,
        }
    }
}

/// Row as stored in the `FileObjects` table.
#[derive(FromRow, Debug)]
struct StoredRow {
    #[sqlx(rename = "Name")]
    name: String,
    #[sqlx(rename = "Size")]
    size: i64,
    #[sqlx(rename = "Time")]
    time: String,
    #[sqlx(rename = "StorageClass")]
    storage_class: String,
}

impl TryFrom<StoredRow> for CacheRow {
    type Error = CacheError;

    fn try_from(row: StoredRow) -> CacheResult<Self> {
        if row.size < 0 {
            return Err(CacheError::CorruptRow {
                key: row.name,
                reason: format!("negative size {}", row.size),
            });
        }
        let timestamp = match parse_timestamp(&row.time) {
            Ok(ts) => ts,
            Err(err) => {
                return Err(CacheError::CorruptRow {
                    key: row.name,
                    reason: format!("bad time `{}`: {}", row.time, err),
                });
            }
        };
        let storage_class = match row.storage_class.parse::<StorageClass>() {
            Ok(class) => class,
            Err(reason) => return Err(CacheError::CorruptRow { key: row.name, reason }),
        };
        Ok(Self {
            key: row.name,
            size: row.size,
            timestamp,
            storage_class,
        })
    }
}

/// Fixed-width RFC 3339 in UTC with nanoseconds; sorts as text and parses
/// back to the identical instant for years 0000-9999 (see [`encode_timestamp`]).
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// [`format_timestamp`] restricted to the years RFC 3339 can express.
/// Outside them chrono emits a signed or five-digit year that
/// [`parse_timestamp`] rejects.
pub fn encode_timestamp(key: &str, ts: DateTime<Utc>) -> CacheResult<String> {
    if !(0..=9999).contains(&ts.year()) {
        return Err(CacheError::UnrepresentableTime {
            key: key.to_string(),
            timestamp: ts,
        });
    }
    Ok(format_timestamp(ts))
}

pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(text).map(|ts| ts.with_timezone(&Utc))
}

#[derive(Clone, Debug)]
pub struct CacheStore {
    cache_dir: PathBuf,
}

impl CacheStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Location of the store for `source_name`: `<cache_dir>/<source_name>.db`.
    pub fn db_path(&self, source_name: &str) -> CacheResult<PathBuf> {
        ensure_source_name_safe(source_name)?;
        Ok(self.cache_dir.join(format!("{source_name}.db")))
    }

    pub async fn exists(&self, source_name: &str) -> CacheResult<bool> {
        let path = self.db_path(source_name)?;
        Ok(fs::try_exists(&path).await?)
    }

    /// Replace the store for `source_name` with a fresh enumeration of `source`.
    ///
    /// Returns the reconciled mapping, version history included.
    pub async fn rebuild(
        &self,
        source_name: &str,
        source: &dyn RepositorySource,
    ) -> CacheResult<ObjectMap> {
        self.rebuild_with_cancel(source_name, source, &CancellationToken::new())
            .await
    }

    /// [`rebuild`](Self::rebuild) that gives up, leaving the previous store
    /// in place, once `cancel` fires.
    pub async fn rebuild_with_cancel(
        &self,
        source_name: &str,
        source: &dyn RepositorySource,
        cancel: &CancellationToken,
    ) -> CacheResult<ObjectMap> {
        let final_path = self.db_path(source_name)?;
        info!("rebuilding cache `{}` from `{}`", source_name, source.name());

        let map = reconcile(source, cancel).await?;
        map.ensure_resolved()?;

        fs::create_dir_all(&self.cache_dir).await?;
        let tmp_path = self.cache_dir.join(format!(".tmp-{}.db", Uuid::new_v4()));
        if let Err(err) = write_rows(&tmp_path, &map).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        if let Err(err) = replace_file(&tmp_path, &final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(CacheError::Io(err));
        }

        info!(
            "cache `{}` rebuilt with {} row(s) at {}",
            source_name,
            map.len(),
            final_path.display()
        );
        Ok(map)
    }

    /// Read the store for `source_name` into single-version aggregates.
    ///
    /// Delete state is not persisted, so every loaded object reports
    /// `is_deleted = false`.
    pub async fn load(&self, source_name: &str) -> CacheResult<ObjectMap> {
        let rows = self.load_rows(source_name).await?;
        let mut index = VersionedObjectIndex::new();
        for row in rows {
            index.ingest_object(row.into())?;
        }
        let map = index.finalize();
        info!("loaded {} object(s) from cache `{}`", map.len(), source_name);
        Ok(map)
    }

    /// Every row of the store in the order it was written.
    pub async fn load_rows(&self, source_name: &str) -> CacheResult<Vec<CacheRow>> {
        let pool = self.open_existing(source_name).await?;
        let stored = sqlx::query_as::<_, StoredRow>(
            "SELECT Name, Size, Time, StorageClass FROM FileObjects ORDER BY rowid",
        )
        .fetch_all(&pool)
        .await;
        pool.close().await;

        stored?.into_iter().map(CacheRow::try_from).collect()
    }

    pub async fn row_count(&self, source_name: &str) -> CacheResult<i64> {
        let pool = self.open_existing(source_name).await?;
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM FileObjects")
            .fetch_one(&pool)
            .await;
        pool.close().await;
        Ok(count?)
    }

    /// Load the store unless `refresh` is set or no store exists yet, in
    /// which case rebuild it from `source`. Stores never expire on their own.
    pub async fn load_or_rebuild(
        &self,
        source_name: &str,
        source: &dyn RepositorySource,
        refresh: bool,
        cancel: &CancellationToken,
    ) -> CacheResult<ObjectMap> {
        if refresh || !self.exists(source_name).await? {
            self.rebuild_with_cancel(source_name, source, cancel).await
        } else {
            self.load(source_name).await
        }
    }

    async fn open_existing(&self, source_name: &str) -> CacheResult<SqlitePool> {
        let path = self.db_path(source_name)?;
        if !fs::try_exists(&path).await? {
            return Err(CacheError::NotFound(source_name.to_string()));
        }
        debug!("opening cache {}", path.display());
        connect(&path, false).await
    }
}

async fn connect(path: &Path, create: bool) -> CacheResult<SqlitePool> {
    let options = SqliteConnectOptions::new().filename(path);
    let options = if create {
        options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete)
    } else {
        options.read_only(true)
    };
    Ok(SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?)
}

/// Rename `from` over `to`, removing `to` first on platforms where rename
/// refuses to overwrite.
async fn replace_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to).await {
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            fs::remove_file(to).await?;
            fs::rename(from, to).await
        }
        other => other,
    }
}

/// Create the schema in a new database at `path` and insert one row per key.
async fn write_rows(path: &Path, map: &ObjectMap) -> CacheResult<()> {
    let pool = connect(path, true).await?;
    let result = insert_all(&pool, map).await;
    pool.close().await;
    result
}

async fn insert_all(pool: &SqlitePool, map: &ObjectMap) -> CacheResult<()> {
    run_migrations(pool).await?;

    let mut tx = pool.begin().await?;
    for agg in map {
        let current = agg.current()?;
        let time = encode_timestamp(agg.key(), current.timestamp)?;
        sqlx::query(
            "INSERT INTO FileObjects (Name, Size, Time, StorageClass) VALUES (?, ?, ?, ?)",
        )
        .bind(agg.key())
        .bind(current.size)
        .bind(time)
        .bind(current.storage_class.as_str())
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Run the embedded schema statements one by one.
async fn run_migrations(pool: &SqlitePool) -> CacheResult<()> {
    let statements = SCHEMA
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty());
    for stmt in statements {
        debug!("executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(pool).await?;
    }
    Ok(())
}

/// Source names become file stems inside `cache_dir`.
///
/// Rejects empty or over-long names, names starting with `.` (reserved for
/// temporary files), path separators and control characters.
fn ensure_source_name_safe(name: &str) -> CacheResult<()> {
    let reason = if name.is_empty() {
        "must not be empty"
    } else if name.len() > MAX_SOURCE_NAME_LEN {
        "must be at most 255 bytes"
    } else if name.starts_with('.') {
        "must not start with a dot"
    } else if name.contains('/') || name.contains('\\') {
        "must not contain path separators"
    } else if name.chars().any(char::is_control) {
        "must not contain control characters"
    } else {
        return Ok(());
    };
    Err(CacheError::InvalidSourceName {
        name: name.to_string(),
        reason: reason.into(),
    })
}
