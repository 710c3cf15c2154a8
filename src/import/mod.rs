//! Ingesting files into the archive.
//!
//! One file is one transaction: the photo row (or the duplicate it
//! resolves to), its tags, its album, its EXIF row and the copy in `bulk/`
//! all appear together or not at all.

pub mod tags;

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ImportConfig;
use crate::content::{canonical_name, read_source};
use crate::db::{Archive, Photo};
use crate::error::{Error, IoResultExt, Result};
use crate::layout::{ensure_readable_dir, ArchiveLayout};
use crate::scanner::{discover_images, parse_exif, ExifFields};

pub use tags::{album_name, derive_tags};

/// The EXIF collaborator: raw bytes in, fields or a parse error out.
pub type ExifParser = fn(&[u8]) -> Result<ExifFields>;

/// What happened to one successfully imported file.
#[derive(Debug, Clone, Serialize)]
pub struct ImportRecord {
    pub name: String,
    pub id: i64,
    pub path: PathBuf,
    pub hash: String,
    pub size: u64,
    pub date: NaiveDateTime,
    pub duplicate: bool,
    pub tags: Vec<String>,
    pub album: Option<String>,
    pub exif: bool,
}

#[derive(Debug, Clone)]
pub enum ImportProgress {
    Started { total_files: usize },
    Imported { current: usize, total: usize, record: ImportRecord },
    Skipped { current: usize, total: usize, path: PathBuf },
    Failed { current: usize, total: usize, path: PathBuf, message: String },
    Completed(ImportSummary),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub found: usize,
    pub imported: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub struct Importer<'a> {
    layout: &'a ArchiveLayout,
    config: &'a ImportConfig,
    parse_exif: ExifParser,
}

impl<'a> Importer<'a> {
    pub fn new(layout: &'a ArchiveLayout, config: &'a ImportConfig) -> Self {
        Self {
            layout,
            config,
            parse_exif,
        }
    }

    pub fn with_exif_parser(mut self, parser: ExifParser) -> Self {
        self.parse_exif = parser;
        self
    }

    /// Import every accepted file below `import_root`, one after the other.
    ///
    /// Per-file failures are counted and reported; only an unusable import
    /// root fails the whole call.
    pub fn import_directory(
        &self,
        archive: &mut Archive,
        import_root: &Path,
        progress_tx: Option<&mpsc::Sender<ImportProgress>>,
    ) -> Result<ImportSummary> {
        ensure_readable_dir(import_root)?;
        let import_root = import_root.canonicalize().with_path(import_root)?;

        let files = discover_images(&import_root, self.config);
        let total = files.len();
        info!("Importing {} files from {}", total, import_root.display());
        if let Some(tx) = progress_tx {
            let _ = tx.send(ImportProgress::Started { total_files: total });
        }

        let mut summary = ImportSummary {
            found: total,
            ..ImportSummary::default()
        };

        for (index, path) in files.into_iter().enumerate() {
            let current = index + 1;
            let event = match self.import_file(archive, &path, &import_root) {
                Ok(record) => {
                    if record.duplicate {
                        summary.duplicates += 1;
                    } else {
                        summary.imported += 1;
                    }
                    ImportProgress::Imported { current, total, record }
                }
                Err(Error::Unsupported { path }) => {
                    debug!("Skipping {}", path.display());
                    summary.skipped += 1;
                    ImportProgress::Skipped { current, total, path }
                }
                Err(e) => {
                    warn!("File {} cannot be imported: {}", path.display(), e);
                    summary.failed += 1;
                    ImportProgress::Failed {
                        current,
                        total,
                        path,
                        message: e.to_string(),
                    }
                }
            };

            if let Some(tx) = progress_tx {
                let _ = tx.send(event);
            }
        }

        info!(
            "Import finished: {} new, {} duplicates, {} failed, {} skipped",
            summary.imported, summary.duplicates, summary.failed, summary.skipped
        );
        if let Some(tx) = progress_tx {
            let _ = tx.send(ImportProgress::Completed(summary.clone()));
        }

        Ok(summary)
    }

    /// Import one file found below `import_root`.
    ///
    /// Unsupported or unreadable files are rejected before a transaction is
    /// opened. After that any failure rolls back every row written for the
    /// file, and a bulk copy that was already made is removed again.
    pub fn import_file(&self, archive: &mut Archive, source: &Path, import_root: &Path) -> Result<ImportRecord> {
        if !self.config.accepts(source) {
            return Err(Error::Unsupported {
                path: source.to_path_buf(),
            });
        }

        let file = read_source(source)?;
        let identity = &file.identity;

        let tags = self.tags_for(import_root, source)?;
        let import_root = import_root.canonicalize().with_path(import_root)?;
        let album = album_name(&import_root);

        let bulk_dir = self.layout.bulk_dir();
        let mut copied: Option<PathBuf> = None;

        let result = archive.run_in_transaction(|tx| {
            let tentative_id = tx.next_photo_id()?;
            let tentative_name = canonical_name(identity.modified.date(), tentative_id, &file.extension);

            let (photo, duplicate) = match tx.find_duplicate(&identity.hash, identity.size, identity.modified)? {
                Some(existing) => (existing, true),
                None => {
                    let photo = Photo::new(tentative_id, tentative_name, identity);
                    tx.insert_photo(&photo)?;
                    (photo, false)
                }
            };

            for tag in &tags {
                tx.insert_tag_if_absent(tag, photo.id)?;
            }
            if let Some(album) = &album {
                tx.insert_album_if_absent(album, photo.id)?;
            }

            let mut exif = false;
            if !duplicate {
                match (self.parse_exif)(&file.bytes) {
                    Ok(fields) => {
                        tx.insert_exif(photo.id, &fields)?;
                        exif = true;
                    }
                    Err(e) => debug!("No EXIF for {}: {}", source.display(), e),
                }

                let destination = bulk_dir.join(&photo.name);
                write_new_file(&destination, &file.bytes)?;
                copied = Some(destination);
            }

            Ok(ImportRecord {
                name: photo.name,
                id: photo.id,
                path: source.to_path_buf(),
                hash: photo.hash,
                size: photo.size,
                date: photo.date,
                duplicate,
                tags: tags.clone(),
                album: album.clone(),
                exif,
            })
        });

        match result {
            Ok(record) => {
                info!(
                    photo = %record.name,
                    hash = %record.hash,
                    size = record.size,
                    date = %record.date,
                    duplicate = record.duplicate,
                    "Imported {}",
                    source.display()
                );
                Ok(record)
            }
            Err(e) => {
                // Only reached with a copy in place when the commit itself failed
                if let Some(destination) = copied {
                    if let Err(remove) = std::fs::remove_file(&destination) {
                        warn!("Cannot remove {}: {}", destination.display(), remove);
                    }
                }
                Err(e)
            }
        }
    }

    /// Tags from the path as it was found, so directories reached through
    /// symlinks still count. Fully resolved paths are only the last resort.
    fn tags_for(&self, import_root: &Path, source: &Path) -> Result<Vec<String>> {
        let absolute_root = std::path::absolute(import_root).with_path(import_root)?;
        let absolute_source = std::path::absolute(source).with_path(source)?;
        let canonical_root = import_root.canonicalize().with_path(import_root)?;

        let (root, located) = if absolute_source.starts_with(&absolute_root) {
            (absolute_root, absolute_source)
        } else if absolute_source.starts_with(&canonical_root) {
            (canonical_root, absolute_source)
        } else {
            (canonical_root, source.canonicalize().with_path(source)?)
        };

        Ok(derive_tags(&root, &located, &self.config.tag_separators))
    }
}

/// Write `bytes` to a file that must not exist yet. A partial file is
/// removed again on failure.
fn write_new_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_path(path)?;

    if let Err(e) = file.write_all(bytes).and_then(|_| file.sync_all()) {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(Error::Io {
            path: path.to_path_buf(),
            source: e,
        });
    }

    Ok(())
}
