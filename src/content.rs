//! Content identity and canonical archive names.
//!
//! Nothing here touches the database: a file's identity is its digest, its
//! length and its modification time, and its canonical name is derived from
//! the modification date and the photo id it is (or will be) stored under.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime};
use md5::{Digest, Md5};
use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, Result};

/// The deduplication key of a photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentIdentity {
    /// Uppercase hex MD5 digest of the full content.
    pub hash: String,
    pub size: u64,
    pub modified: NaiveDateTime,
}

/// A file read fully into memory together with its identity.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub identity: ContentIdentity,
    /// Extension as found on disk, without the dot.
    pub extension: String,
}

pub fn identify(bytes: &[u8], modified: NaiveDateTime) -> ContentIdentity {
    let mut hasher = Md5::new();
    hasher.update(bytes);

    ContentIdentity {
        hash: format!("{:X}", hasher.finalize()),
        size: bytes.len() as u64,
        modified,
    }
}

/// `YYYY-MM-DD-XXXXXX.EXT`, the id in zero-padded hex, all uppercase.
pub fn canonical_name(date: NaiveDate, id: i64, extension: &str) -> String {
    let stem = format!(
        "{:04}-{:02}-{:02}-{:06x}",
        date.year(),
        date.month(),
        date.day(),
        id
    );

    if extension.is_empty() {
        stem.to_uppercase()
    } else {
        format!("{}.{}", stem, extension).to_uppercase()
    }
}

/// Read a candidate file and compute its identity.
///
/// Fails with [`Error::Io`](crate::Error::Io) when the file or its metadata
/// cannot be read completely.
pub fn read_source(path: &Path) -> Result<SourceFile> {
    let metadata = std::fs::metadata(path).with_path(path)?;
    let modified = metadata.modified().with_path(path)?;
    let bytes = std::fs::read(path).with_path(path)?;

    let modified = DateTime::<Local>::from(modified).naive_local();
    let identity = identify(&bytes, modified);
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(SourceFile {
        path: path.to_path_buf(),
        bytes,
        identity,
        extension,
    })
}
