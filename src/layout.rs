//! On-disk layout of an archive.
//!
//! ```text
//! <root>/
//! ├── database.s3db   relational store
//! ├── phodb.toml      configuration
//! ├── bulk/           canonical copies, one file per photo
//! ├── sort/           derived views (by_date, by_tag, by_album, by_size)
//! └── log/            run logs
//! ```

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::{Config, CONFIG_FILE};
use crate::db::Archive;
use crate::error::{Error, IoResultExt, Result};
use crate::views::ViewKind;

pub const BULK_DIR: &str = "bulk";
pub const SORT_DIR: &str = "sort";
pub const LOG_DIR: &str = "log";

#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    root: PathBuf,
    database: String,
}

impl ArchiveLayout {
    pub fn new(root: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            root: root.into(),
            database: config.database.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(&self.database)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn bulk_dir(&self) -> PathBuf {
        self.root.join(BULK_DIR)
    }

    pub fn sort_dir(&self) -> PathBuf {
        self.root.join(SORT_DIR)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join(LOG_DIR)
    }

    pub fn view_dir(&self, kind: ViewKind) -> PathBuf {
        self.sort_dir().join(kind.dir_name())
    }

    /// Bootstrap a new archive in `root`, which must exist and be empty.
    pub fn create(root: &Path, config: &Config) -> Result<(Self, Archive)> {
        ensure_readable_dir(root)?;

        let mut entries = std::fs::read_dir(root).with_path(root)?;
        if entries.next().is_some() {
            return Err(Error::validation(format!(
                "Directory {} is not empty! Please provide an empty directory.",
                root.display()
            )));
        }

        let layout = Self::new(root, config);
        match layout.populate(config) {
            Ok(archive) => {
                info!("Created archive at {}", root.display());
                Ok((layout, archive))
            }
            Err(e) => {
                // The root was empty before; make it so again
                layout.remove_partial();
                Err(e)
            }
        }
    }

    fn populate(&self, config: &Config) -> Result<Archive> {
        for dir in [self.bulk_dir(), self.sort_dir(), self.log_dir()] {
            std::fs::create_dir(&dir).with_path(&dir)?;
        }
        let archive = Archive::create(&self.database_path())?;
        config.save(&self.config_path())?;
        Ok(archive)
    }

    fn remove_partial(&self) {
        for dir in [self.bulk_dir(), self.sort_dir(), self.log_dir()] {
            if dir.is_dir() {
                if let Err(e) = std::fs::remove_dir_all(&dir) {
                    warn!("Cannot remove {}: {}", dir.display(), e);
                }
            }
        }
        for file in [self.database_path(), self.config_path()] {
            if file.is_file() {
                if let Err(e) = std::fs::remove_file(&file) {
                    warn!("Cannot remove {}: {}", file.display(), e);
                }
            }
        }
    }

    /// Open an existing archive for importing or linking.
    pub fn open(root: &Path, config: &Config) -> Result<(Self, Archive)> {
        ensure_readable_dir(root)?;

        let layout = Self::new(root, config);
        let database = layout.database_path();
        if !database.is_file() {
            return Err(Error::validation(format!(
                "Directory {} has no database!",
                root.display()
            )));
        }

        let archive = Archive::open(&database)?;
        Ok((layout, archive))
    }
}

/// The directory must exist and be listable.
pub fn ensure_readable_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(Error::validation(format!("Directory {} not found!", path.display())));
    }
    if std::fs::read_dir(path).is_err() {
        return Err(Error::validation(format!("Directory {} not readable!", path.display())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_archive() {
        let dir = tempdir().unwrap();
        let (layout, archive) = ArchiveLayout::create(dir.path(), &Config::default()).unwrap();

        assert!(layout.bulk_dir().is_dir());
        assert!(layout.sort_dir().is_dir());
        assert!(layout.log_dir().is_dir());
        assert!(layout.config_path().is_file());
        assert_eq!(archive.path(), dir.path().join("database.s3db"));
        assert_eq!(layout.view_dir(ViewKind::Size), dir.path().join("sort/by_size"));
    }

    #[test]
    fn test_create_requires_empty_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".hidden"), b"x").unwrap();

        let err = ArchiveLayout::create(dir.path(), &Config::default()).err().unwrap();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_create_requires_existing_directory() {
        let dir = tempdir().unwrap();
        let err = ArchiveLayout::create(&dir.path().join("missing"), &Config::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_failed_create_leaves_root_empty() {
        let dir = tempdir().unwrap();
        let config = Config {
            database: "missing/database.s3db".to_string(),
            ..Config::default()
        };

        let err = ArchiveLayout::create(dir.path(), &config).err().unwrap();
        assert_eq!(err.exit_code(), 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        // Nothing left behind, so a retry is not refused as "not empty"
        assert!(ArchiveLayout::create(dir.path(), &Config::default()).is_ok());
    }

    #[test]
    fn test_open_requires_database() {
        let dir = tempdir().unwrap();
        let err = ArchiveLayout::open(dir.path(), &Config::default()).err().unwrap();
        assert!(err.to_string().contains("has no database"));

        ArchiveLayout::create(dir.path(), &Config::default()).unwrap();
        assert!(ArchiveLayout::open(dir.path(), &Config::default()).is_ok());
    }
}
