//! Represents a path-addressed object (a file on disk or an object key in a bucket).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default delimiter between path segments of an object key.
pub const DEFAULT_DELIMITER: &str = "/";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathObjectError {
    #[error("full name not given and either name or folder missing")]
    MissingName,
    #[error("full name given together with name or folder")]
    AmbiguousName,
    #[error("size must be greater than or equal to 0, got {0}")]
    NegativeSize(i64),
    #[error("path delimiter must not be empty")]
    EmptyDelimiter,
    #[error("name `{name}` contains the delimiter `{delimiter}`")]
    DelimiterInName { name: String, delimiter: String },
}

/// An immutable, path-addressed object.
///
/// Either the full name or the `(name, folder)` pair is supplied when the
/// object is built; the other form is derived from it. The folder of a
/// root-level object is the empty string.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PathObject {
    /// Full path of the object, relative to the root of its repository.
    full_name: String,

    /// Final path segment.
    name: String,

    /// Every segment before the last delimiter, without the delimiter itself.
    folder: String,

    /// Size in bytes.
    size: i64,

    /// When the object was last modified.
    timestamp: DateTime<Utc>,
}

impl PathObject {
    pub fn builder() -> PathObjectBuilder {
        PathObjectBuilder::default()
    }

    /// Build from a full path using the default `/` delimiter.
    pub fn from_full_name(
        full_name: impl Into<String>,
        size: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, PathObjectError> {
        Self::builder()
            .full_name(full_name)
            .size(size)
            .timestamp(timestamp)
            .build()
    }

    /// Build from a folder and a file name using the default `/` delimiter.
    pub fn from_parts(
        folder: impl Into<String>,
        name: impl Into<String>,
        size: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, PathObjectError> {
        Self::builder()
            .folder(folder)
            .name(name)
            .size(size)
            .timestamp(timestamp)
            .build()
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Collects the optional pieces of a [`PathObject`] and validates them in
/// [`PathObjectBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct PathObjectBuilder {
    full_name: Option<String>,
    name: Option<String>,
    folder: Option<String>,
    size: i64,
    timestamp: Option<DateTime<Utc>>,
    delimiter: Option<String>,
}

impl PathObjectBuilder {
    pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    pub fn size(mut self, size: i64) -> Self {
        self.size = size;
        self
    }

    /// Defaults to the time of the `build` call when never set.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Validate the supplied pieces and derive the missing path form.
    ///
    /// Exactly one of `full_name` or the `(name, folder)` pair must be set.
    pub fn build(self) -> Result<PathObject, PathObjectError> {
        let delimiter = self.delimiter.as_deref().unwrap_or(DEFAULT_DELIMITER);
        if delimiter.is_empty() {
            return Err(PathObjectError::EmptyDelimiter);
        }

        let (full_name, name, folder) = match (self.full_name, self.name, self.folder) {
            (Some(full_name), None, None) => {
                let (folder, name) = split_full_name(&full_name, delimiter);
                let (folder, name) = (folder.to_string(), name.to_string());
                (full_name, name, folder)
            }
            (None, Some(name), Some(folder)) => {
                if name.contains(delimiter) {
                    return Err(PathObjectError::DelimiterInName {
                        name,
                        delimiter: delimiter.to_string(),
                    });
                }
                let full_name = format!("{folder}{delimiter}{name}");
                (full_name, name, folder)
            }
            (Some(_), _, _) => return Err(PathObjectError::AmbiguousName),
            (None, _, _) => return Err(PathObjectError::MissingName),
        };

        if self.size < 0 {
            return Err(PathObjectError::NegativeSize(self.size));
        }

        Ok(PathObject {
            full_name,
            name,
            folder,
            size: self.size,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        })
    }
}

/// Split `full_name` at its last delimiter into `(folder, name)`.
fn split_full_name<'a>(full_name: &'a str, delimiter: &str) -> (&'a str, &'a str) {
    match full_name.rfind(delimiter) {
        Some(pos) => (&full_name[..pos], &full_name[pos + delimiter.len()..]),
        None => ("", full_name),
    }
}
