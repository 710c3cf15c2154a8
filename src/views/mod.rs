//! Derived symlink trees under `sort/`.
//!
//! Every view is the same walk over the archive: read the rows for its kind,
//! turn each row into a list of directory segments, and link
//! `sort/<view>/<segments…>/<name>` back to `bulk/<name>` with a relative
//! target. Links that already exist are left alone, so re-running a view over
//! an unchanged archive touches nothing.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::mpsc;
use tracing::{debug, info, warn};

use crate::db::{Archive, GroupKey, ViewRow};
use crate::error::{Error, IoResultExt, Result};
use crate::layout::{ArchiveLayout, BULK_DIR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Date,
    Tag,
    Album,
    Size,
}

impl ViewKind {
    pub const ALL: [ViewKind; 4] = [ViewKind::Date, ViewKind::Tag, ViewKind::Album, ViewKind::Size];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKind::Date => "date",
            ViewKind::Tag => "tag",
            ViewKind::Album => "album",
            ViewKind::Size => "size",
        }
    }

    /// Directory of this view below `sort/`.
    pub fn dir_name(&self) -> &'static str {
        match self {
            ViewKind::Date => "by_date",
            ViewKind::Tag => "by_tag",
            ViewKind::Album => "by_album",
            ViewKind::Size => "by_size",
        }
    }

    /// The grouping function: directory segments a row is linked under.
    ///
    /// Returns `None` when the row does not carry the key this view groups by.
    pub fn segments(&self, row: &ViewRow) -> Option<Vec<String>> {
        let date = row.date.date();
        let month = format!("{:04}-{:02}", date.year(), date.month());

        match (self, &row.key) {
            (ViewKind::Date, _) => Some(vec![
                format!("{:04}", date.year()),
                format!("{:02}", date.month()),
                format!("{:02}", date.day()),
            ]),
            (ViewKind::Tag | ViewKind::Album, GroupKey::Label(label)) => Some(vec![label.clone(), month]),
            (ViewKind::Size, GroupKey::Dimensions { width, height }) => {
                Some(vec![format!("{}x{}", width, height), month])
            }
            _ => None,
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ViewKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| Error::validation(format!("Unknown view '{}' (expected date, tag, album or size)", s)))
    }
}

#[derive(Debug, Clone)]
pub enum LinkProgress {
    Started { kind: ViewKind, total: usize },
    Linked { kind: ViewKind, path: PathBuf },
    Failed { kind: ViewKind, path: PathBuf, message: String },
    Completed(LinkSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSummary {
    pub kind: ViewKind,
    pub total: usize,
    pub created: usize,
    pub existing: usize,
    pub failed: usize,
}

/// Build views of an archive. Reads the database, writes only below `sort/`.
pub struct Linker<'a> {
    layout: &'a ArchiveLayout,
}

impl<'a> Linker<'a> {
    pub fn new(layout: &'a ArchiveLayout) -> Self {
        Self { layout }
    }

    /// Materialize one view.
    ///
    /// With `rebuild` the view directory is removed first, for views whose
    /// membership can shrink. Failing links are counted and reported; only a
    /// failing query or an unusable view root aborts the view.
    pub fn link(
        &self,
        archive: &Archive,
        kind: ViewKind,
        rebuild: bool,
        progress_tx: Option<&mpsc::Sender<LinkProgress>>,
    ) -> Result<LinkSummary> {
        let view_root = self.layout.view_dir(kind);

        if rebuild && view_root.exists() {
            info!("Clearing {} before rebuild", view_root.display());
            std::fs::remove_dir_all(&view_root).with_path(&view_root)?;
        }
        std::fs::create_dir_all(&view_root).with_path(&view_root)?;

        let rows = archive.view_rows(kind)?;
        let total = rows.len();
        if let Some(tx) = progress_tx {
            let _ = tx.send(LinkProgress::Started { kind, total });
        }

        let mut summary = LinkSummary {
            kind,
            total,
            created: 0,
            existing: 0,
            failed: 0,
        };

        for row in &rows {
            let Some(segments) = kind.segments(row).filter(|s| s.iter().all(|s| is_safe_segment(s))) else {
                warn!("Cannot place {} in the {} view: {:?}", row.name, kind, row.key);
                summary.failed += 1;
                continue;
            };

            let link_dir = segments.iter().fold(view_root.clone(), |dir, s| dir.join(s));
            let link_path = link_dir.join(&row.name);

            // symlink_metadata so that a dangling link still counts as present
            if link_path.symlink_metadata().is_ok() {
                summary.existing += 1;
                continue;
            }

            // sort/<view>/<segments...> below the archive root
            let depth = 2 + segments.len();
            let target = relative_bulk_target(depth, &row.name);

            match std::fs::create_dir_all(&link_dir).and_then(|_| create_symlink(&target, &link_path)) {
                Ok(()) => {
                    debug!("Linked {} -> {}", link_path.display(), target.display());
                    summary.created += 1;
                    if let Some(tx) = progress_tx {
                        let _ = tx.send(LinkProgress::Linked {
                            kind,
                            path: link_path,
                        });
                    }
                }
                Err(e) => {
                    warn!("Cannot link {}: {}", link_path.display(), e);
                    summary.failed += 1;
                    if let Some(tx) = progress_tx {
                        let _ = tx.send(LinkProgress::Failed {
                            kind,
                            path: link_path,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            "View {}: {} rows, {} created, {} existing, {} failed",
            kind, summary.total, summary.created, summary.existing, summary.failed
        );
        if let Some(tx) = progress_tx {
            let _ = tx.send(LinkProgress::Completed(summary.clone()));
        }

        Ok(summary)
    }
}

/// `../` once per directory level between the link and the archive root,
/// then `bulk/<name>`.
pub fn relative_bulk_target(depth: usize, name: &str) -> PathBuf {
    let mut target = PathBuf::new();
    for _ in 0..depth {
        target.push("..");
    }
    target.join(BULK_DIR).join(name)
}

/// A segment must stay a single directory level. Only the platform's own
/// separators are refused, names are otherwise taken literally.
fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(std::path::is_separator)
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::Photo;
    use crate::scanner::ExifFields;
    use chrono::NaiveDateTime;
    use std::collections::BTreeMap;
    use tempfile::tempdir;
    use walkdir::WalkDir;

    fn row(name: &str, date: &str, key: GroupKey) -> ViewRow {
        ViewRow {
            name: name.to_string(),
            date: NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S").unwrap(),
            key,
        }
    }

    #[test]
    fn test_segments() {
        let plain = row("A.JPG", "2020-03-07 10:00:00", GroupKey::None);
        assert_eq!(ViewKind::Date.segments(&plain).unwrap(), vec!["2020", "03", "07"]);
        assert_eq!(ViewKind::Tag.segments(&plain), None);

        let tagged = row("A.JPG", "2020-03-07 10:00:00", GroupKey::Label("paris".to_string()));
        assert_eq!(ViewKind::Tag.segments(&tagged).unwrap(), vec!["paris", "2020-03"]);
        assert_eq!(ViewKind::Album.segments(&tagged).unwrap(), vec!["paris", "2020-03"]);

        let sized = row("A.JPG", "2020-11-30 10:00:00", GroupKey::Dimensions { width: 640, height: 480 });
        assert_eq!(ViewKind::Size.segments(&sized).unwrap(), vec!["640x480", "2020-11"]);
    }

    #[test]
    fn test_relative_bulk_target() {
        assert_eq!(
            relative_bulk_target(5, "2020-03-07-000001.JPG"),
            PathBuf::from("../../../../../bulk/2020-03-07-000001.JPG")
        );
        assert_eq!(relative_bulk_target(4, "X.JPG"), PathBuf::from("../../../../bulk/X.JPG"));
    }

    #[test]
    fn test_view_kind_parsing() {
        assert_eq!("date".parse::<ViewKind>().unwrap(), ViewKind::Date);
        assert_eq!(" size".parse::<ViewKind>().unwrap(), ViewKind::Size);
        assert!("colour".parse::<ViewKind>().is_err());
        assert_eq!(ViewKind::Album.to_string(), "album");
        assert_eq!(ViewKind::Tag.dir_name(), "by_tag");
    }

    #[test]
    fn test_unsafe_segments() {
        assert!(is_safe_segment("paris"));
        assert!(is_safe_segment("2020-03"));
        assert!(!is_safe_segment(""));
        assert!(!is_safe_segment(".."));
        assert!(!is_safe_segment("a/b"));

        #[cfg(unix)]
        assert!(is_safe_segment("a\\b"));
        #[cfg(windows)]
        assert!(!is_safe_segment("a\\b"));
    }

    /// Archive with two photos in bulk/, one tagged, on disk under a temp dir.
    fn archive_with_photos(root: &Path) -> (ArchiveLayout, Archive) {
        let layout = ArchiveLayout::new(root, &Config::default());
        std::fs::create_dir_all(layout.bulk_dir()).unwrap();
        std::fs::create_dir_all(layout.sort_dir()).unwrap();
        let mut archive = Archive::create(&layout.database_path()).unwrap();

        let photos = [
            ("2020-03-07-000001.JPG", "2020-03-07 10:00:00"),
            ("2021-12-24-000002.PNG", "2021-12-24 18:30:00"),
        ];
        archive
            .run_in_transaction(|tx| {
                for (id, (name, date)) in photos.iter().enumerate() {
                    let id = id as i64 + 1;
                    tx.insert_photo(&Photo {
                        id,
                        name: name.to_string(),
                        hash: format!("HASH{id}"),
                        size: 3,
                        date: NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S").unwrap(),
                    })?;
                }
                tx.insert_tag_if_absent("paris", 1)?;
                Ok(())
            })
            .unwrap();

        for (name, _) in photos {
            std::fs::write(layout.bulk_dir().join(name), name.as_bytes()).unwrap();
        }

        (layout, archive)
    }

    /// Every symlink below `dir` with its target.
    fn snapshot(dir: &Path) -> BTreeMap<PathBuf, PathBuf> {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path_is_symlink())
            .map(|e| (e.path().to_path_buf(), std::fs::read_link(e.path()).unwrap()))
            .collect()
    }

    #[cfg(unix)]
    #[test]
    fn test_date_view_is_idempotent() {
        let dir = tempdir().unwrap();
        let (layout, archive) = archive_with_photos(dir.path());
        let linker = Linker::new(&layout);

        let first = linker.link(&archive, ViewKind::Date, false, None).unwrap();
        assert_eq!((first.total, first.created, first.existing, first.failed), (2, 2, 0, 0));
        let before = snapshot(&layout.sort_dir());

        let link = layout.view_dir(ViewKind::Date).join("2020/03/07/2020-03-07-000001.JPG");
        assert_eq!(
            std::fs::read_link(&link).unwrap(),
            PathBuf::from("../../../../../bulk/2020-03-07-000001.JPG")
        );
        assert_eq!(std::fs::read(&link).unwrap(), b"2020-03-07-000001.JPG");

        let second = linker.link(&archive, ViewKind::Date, false, None).unwrap();
        assert_eq!((second.created, second.existing, second.failed), (0, 2, 0));
        assert_eq!(snapshot(&layout.sort_dir()), before);
    }

    #[cfg(unix)]
    #[test]
    fn test_tag_view_links_resolve() {
        let dir = tempdir().unwrap();
        let (layout, archive) = archive_with_photos(dir.path());
        let (tx, rx) = mpsc::channel();

        let summary = Linker::new(&layout).link(&archive, ViewKind::Tag, false, Some(&tx)).unwrap();
        assert_eq!((summary.total, summary.created), (1, 1));

        let link = layout.view_dir(ViewKind::Tag).join("paris/2020-03/2020-03-07-000001.JPG");
        assert_eq!(std::fs::read(&link).unwrap(), b"2020-03-07-000001.JPG");

        drop(tx);
        let events: Vec<_> = rx.iter().collect();
        assert!(matches!(events.first(), Some(LinkProgress::Started { total: 1, .. })));
        assert!(matches!(events.last(), Some(LinkProgress::Completed(s)) if s.created == 1));
    }

    #[cfg(unix)]
    #[test]
    fn test_rebuild_clears_stale_links() {
        let dir = tempdir().unwrap();
        let (layout, archive) = archive_with_photos(dir.path());
        let linker = Linker::new(&layout);

        let stale_dir = layout.view_dir(ViewKind::Tag).join("rome/2019-01");
        std::fs::create_dir_all(&stale_dir).unwrap();
        create_symlink(Path::new("../../../../bulk/GONE.JPG"), &stale_dir.join("GONE.JPG")).unwrap();

        linker.link(&archive, ViewKind::Tag, false, None).unwrap();
        assert!(stale_dir.join("GONE.JPG").symlink_metadata().is_ok());

        let rebuilt = linker.link(&archive, ViewKind::Tag, true, None).unwrap();
        assert_eq!(rebuilt.created, 1);
        assert!(!layout.view_dir(ViewKind::Tag).join("rome").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_size_view_without_exif_is_empty() {
        let dir = tempdir().unwrap();
        let (layout, archive) = archive_with_photos(dir.path());

        let summary = Linker::new(&layout).link(&archive, ViewKind::Size, false, None).unwrap();
        assert_eq!(summary.total, 0);
        assert!(layout.view_dir(ViewKind::Size).is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_size_and_album_views_link_to_bulk() {
        let dir = tempdir().unwrap();
        let (layout, mut archive) = archive_with_photos(dir.path());
        archive
            .run_in_transaction(|tx| {
                tx.insert_exif(
                    1,
                    &ExifFields {
                        width: Some(640),
                        height: Some(480),
                        ..ExifFields::default()
                    },
                )?;
                tx.insert_album_if_absent("Trip", 2)
            })
            .unwrap();
        let linker = Linker::new(&layout);

        let sizes = linker.link(&archive, ViewKind::Size, false, None).unwrap();
        assert_eq!((sizes.total, sizes.created, sizes.failed), (1, 1, 0));
        let link = layout.view_dir(ViewKind::Size).join("640x480/2020-03/2020-03-07-000001.JPG");
        assert_eq!(
            std::fs::read_link(&link).unwrap(),
            PathBuf::from("../../../../bulk/2020-03-07-000001.JPG")
        );
        assert_eq!(std::fs::read(&link).unwrap(), b"2020-03-07-000001.JPG");

        let albums = linker.link(&archive, ViewKind::Album, false, None).unwrap();
        assert_eq!((albums.total, albums.created, albums.failed), (1, 1, 0));
        let link = layout.view_dir(ViewKind::Album).join("Trip/2021-12/2021-12-24-000002.PNG");
        assert_eq!(std::fs::read(&link).unwrap(), b"2021-12-24-000002.PNG");
    }
}
