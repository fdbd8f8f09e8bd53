use chrono::{DateTime, Utc};
use std::{io, path::PathBuf};
use thiserror::Error;

use crate::models::{IncompleteAggregate, InvalidRecord, PathObjectError};

/// Failures while a repository source enumerates its records.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("listing `{source_name}` failed: {message}")]
    Listing {
        source_name: String,
        message: String,
    },
    #[error("invalid object at `{path}`: {source}")]
    InvalidObject {
        path: PathBuf,
        #[source]
        source: PathObjectError,
    },
    #[error(transparent)]
    InvalidRecord(#[from] InvalidRecord),
    #[error("enumeration cancelled after {ingested} record(s)")]
    Cancelled { ingested: u64 },
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Cache(#[from] Box<CacheError>),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SourceError {
    /// Helper for listing collaborators that report plain messages.
    pub fn listing(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Listing {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Failures of the local cache store.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no cache exists for `{0}`")]
    NotFound(String),
    #[error("source name `{name}` invalid: {reason}")]
    InvalidSourceName { name: String, reason: String },
    #[error(transparent)]
    Incomplete(#[from] IncompleteAggregate),
    #[error(transparent)]
    InvalidRecord(#[from] InvalidRecord),
    #[error("time of `{key}` cannot be stored: {timestamp} is outside years 0000-9999")]
    UnrepresentableTime {
        key: String,
        timestamp: DateTime<Utc>,
    },
    #[error("cache row `{key}` is corrupt: {reason}")]
    CorruptRow { key: String, reason: String },
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;
