//! Error types shared by the archive, the import pipeline and the views.

use std::io;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad, missing or non-empty target directory, or a missing database.
    /// Aborts the whole run before any work begins.
    #[error("{0}")]
    Validation(String),

    #[error("database {} cannot be opened: {source}", path.display())]
    StoreOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not a supported image file", path.display())]
    Unsupported { path: PathBuf },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("cannot parse EXIF: {0}")]
    MetadataParse(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Process exit code used by the command line front end.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::StoreOpen { .. } => 2,
            _ => 1,
        }
    }
}

impl From<exif::Error> for Error {
    fn from(e: exif::Error) -> Self {
        Error::MetadataParse(e.to_string())
    }
}

/// Attach the offending path to an I/O error.
pub(crate) trait IoResultExt<T> {
    fn with_path(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_path(self, path: &Path) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
