use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use phodb::config::Config;
use phodb::db::{Archive, TableCounts};
use phodb::import::Importer;
use phodb::layout::ArchiveLayout;
use phodb::Error;
use tempfile::tempdir;

fn write_photo(path: &Path, bytes: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
    let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
    File::options().write(true).open(path).unwrap().set_modified(mtime).unwrap();
}

fn import_all(layout: &ArchiveLayout, archive: &mut Archive, config: &Config, import_root: &Path) {
    let summary = Importer::new(layout, &config.import)
        .import_directory(archive, import_root, None)
        .unwrap();
    assert_eq!(summary.failed, 0);
}

fn setup() -> (tempfile::TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let root = dir.path().join("archive");
    std::fs::create_dir(&root).unwrap();
    (dir, root)
}

#[test]
fn reimport_from_another_directory_merges_tags() {
    let (dir, root) = setup();
    let config = Config::default();
    let (layout, mut archive) = ArchiveLayout::create(&root, &config).unwrap();

    let first = dir.path().join("import1/Trip");
    let second = dir.path().join("import2/Trip");
    write_photo(&first.join("Paris-2020/a.jpg"), b"the same photo");
    write_photo(&second.join("Rome-2020/a.jpg"), b"the same photo");

    import_all(&layout, &mut archive, &config, &first);
    import_all(&layout, &mut archive, &config, &second);

    let photos = archive.photos().unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].id, 1);
    assert_eq!(archive.tags_for(1).unwrap(), vec!["paris", "2020", "rome"]);
    assert_eq!(archive.albums_for(1).unwrap(), vec!["Trip"]);
    assert_eq!(std::fs::read_dir(layout.bulk_dir()).unwrap().count(), 1);

    // Rooting the import deeper gives the same file a new album and no tags
    import_all(&layout, &mut archive, &config, &second.join("Rome-2020"));
    assert_eq!(archive.albums_for(1).unwrap(), vec!["Trip", "Rome-2020"]);
    assert_eq!(archive.tags_for(1).unwrap().len(), 3);
}

#[test]
fn distinct_content_gets_consecutive_ids() {
    let (dir, root) = setup();
    let config = Config::default();
    let (layout, mut archive) = ArchiveLayout::create(&root, &config).unwrap();

    let import_root = dir.path().join("batch");
    write_photo(&import_root.join("a.jpg"), b"one");
    write_photo(&import_root.join("b.png"), b"two");
    write_photo(&import_root.join("c.tif"), b"three");

    import_all(&layout, &mut archive, &config, &import_root);

    let photos = archive.photos().unwrap();
    let ids: Vec<i64> = photos.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(photos[0].name.ends_with("-000001.JPG"));
    assert!(photos[1].name.ends_with("-000002.PNG"));
    assert!(photos[2].name.ends_with("-000003.TIF"));
    for photo in &photos {
        assert!(layout.bulk_dir().join(&photo.name).is_file());
    }
}

#[test]
fn failed_copy_leaves_no_rows() {
    let (dir, root) = setup();
    let config = Config::default();
    let (layout, mut archive) = ArchiveLayout::create(&root, &config).unwrap();

    let import_root = dir.path().join("Trip");
    let photo = import_root.join("Paris-2020/a.jpg");
    write_photo(&photo, b"cannot be copied");

    std::fs::remove_dir(layout.bulk_dir()).unwrap();
    std::fs::write(layout.bulk_dir(), b"").unwrap();

    let err = Importer::new(&layout, &config.import)
        .import_file(&mut archive, &photo, &import_root)
        .unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert_eq!(archive.counts().unwrap(), TableCounts::default());

    // The batch entry point counts the same failure instead of aborting
    let summary = Importer::new(&layout, &config.import)
        .import_directory(&mut archive, &import_root, None)
        .unwrap();
    assert_eq!((summary.found, summary.failed, summary.imported), (1, 1, 0));
    assert_eq!(archive.counts().unwrap(), TableCounts::default());
}

#[cfg(unix)]
#[test]
fn date_view_is_stable_across_runs() {
    use phodb::views::{Linker, ViewKind};
    use walkdir::WalkDir;

    let (dir, root) = setup();
    let config = Config::default();
    let (layout, mut archive) = ArchiveLayout::create(&root, &config).unwrap();

    let import_root = dir.path().join("Trip");
    write_photo(&import_root.join("Paris-2020/a.jpg"), b"one");
    write_photo(&import_root.join("Rome-2020/b.jpg"), b"two");
    import_all(&layout, &mut archive, &config, &import_root);

    let snapshot = || -> Vec<(PathBuf, PathBuf)> {
        WalkDir::new(layout.view_dir(ViewKind::Date))
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path_is_symlink())
            .map(|e| (e.path().to_path_buf(), std::fs::read_link(e.path()).unwrap()))
            .collect()
    };

    let linker = Linker::new(&layout);
    let first = linker.link(&archive, ViewKind::Date, false, None).unwrap();
    let before = snapshot();
    let second = linker.link(&archive, ViewKind::Date, false, None).unwrap();
    let after = snapshot();

    assert_eq!((first.created, first.failed), (2, 0));
    assert_eq!((second.created, second.existing, second.failed), (0, 2, 0));
    assert_eq!(before, after);
    for (link, _) in &after {
        assert!(std::fs::read(link).is_ok(), "{} does not resolve", link.display());
    }
}
