//! The `create`, `import` and `link` operations behind the command line.
//!
//! Each one validates its inputs in the order the exit codes depend on,
//! does its work through the library, and reports progress on stdout from a
//! scoped reporter thread fed over a channel.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{IoResultExt, Result};
use crate::import::{ImportProgress, ImportSummary, Importer};
use crate::layout::{ensure_readable_dir, ArchiveLayout};
use crate::views::{LinkProgress, LinkSummary, Linker, ViewKind};

/// Links per line of dots in the link progress output.
const DOTS_PER_LINE: usize = 50;

/// Bootstrap an archive in the empty directory `root`.
pub fn create(root: &Path) -> Result<ArchiveLayout> {
    let config = Config::load(root)?;
    let (layout, _archive) = ArchiveLayout::create(root, &config)?;
    println!("Created archive in {}", root.display());
    Ok(layout)
}

/// Import every configured image file below `import_path` into the archive
/// at `root`. One JSON line per processed photo goes to
/// `log/<stamp>.import.jsonl`.
pub fn import(root: &Path, import_path: &Path, stamp: &str) -> Result<ImportSummary> {
    ensure_readable_dir(root)?;
    ensure_readable_dir(import_path)?;

    let config = Config::load(root)?;
    let (layout, mut archive) = ArchiveLayout::open(root, &config)?;

    let log_dir = layout.log_dir();
    std::fs::create_dir_all(&log_dir).with_path(&log_dir)?;
    let journal_path = journal_path(&log_dir, stamp);
    let journal = File::create(&journal_path).with_path(&journal_path)?;

    let importer = Importer::new(&layout, &config.import);
    let (tx, rx) = mpsc::channel();

    let summary = thread::scope(|scope| {
        let reporter = scope.spawn(move || report_import(rx, journal));
        let result = importer.import_directory(&mut archive, import_path, Some(&tx));
        drop(tx);
        if reporter.join().is_err() {
            warn!("Import reporter stopped unexpectedly");
        }
        result
    })?;

    info!("Import journal written to {}", journal_path.display());
    Ok(summary)
}

/// Materialize `kinds` (the configured defaults when empty) under `sort/`.
pub fn link(root: &Path, kinds: &[ViewKind], rebuild: bool) -> Result<Vec<LinkSummary>> {
    ensure_readable_dir(root)?;

    let config = Config::load(root)?;
    ensure_readable_dir(&ArchiveLayout::new(root, &config).sort_dir())?;
    let (layout, archive) = ArchiveLayout::open(root, &config)?;

    let kinds = if kinds.is_empty() {
        config.views.default_kinds.as_slice()
    } else {
        kinds
    };
    let rebuild = rebuild || config.views.rebuild;

    let linker = Linker::new(&layout);
    let mut summaries = Vec::with_capacity(kinds.len());

    for &kind in kinds {
        let (tx, rx) = mpsc::channel();
        let summary = thread::scope(|scope| {
            let reporter = scope.spawn(move || report_links(rx));
            let result = linker.link(&archive, kind, rebuild, Some(&tx));
            drop(tx);
            if reporter.join().is_err() {
                warn!("Link reporter stopped unexpectedly");
            }
            result
        })?;
        summaries.push(summary);
    }

    Ok(summaries)
}

pub fn journal_path(log_dir: &Path, stamp: &str) -> PathBuf {
    log_dir.join(format!("{stamp}.import.jsonl"))
}

fn report_import(rx: Receiver<ImportProgress>, journal: File) {
    let mut journal = BufWriter::new(journal);
    let mut journal_ok = true;
    let stdout = io::stdout();

    for event in rx {
        let mut out = stdout.lock();
        let _ = match event {
            ImportProgress::Started { total_files } => writeln!(out, "Found {} files", total_files),
            ImportProgress::Imported { record, .. } => {
                if journal_ok {
                    let written = serde_json::to_writer(&mut journal, &record)
                        .map_err(io::Error::from)
                        .and_then(|_| writeln!(journal));
                    if let Err(e) = written {
                        warn!("Cannot write import journal: {}", e);
                        journal_ok = false;
                    }
                }

                if record.duplicate {
                    writeln!(out, "dupe...{}", record.path.display())
                } else {
                    writeln!(out, "{}...{}", record.id, record.path.display())
                }
            }
            ImportProgress::Skipped { path, .. } => writeln!(out, "skip...{}", path.display()),
            ImportProgress::Failed { path, message, .. } => {
                writeln!(out, "fail...{}: {}", path.display(), message)
            }
            ImportProgress::Completed(summary) => writeln!(
                out,
                "Imported: {}, duplicates: {}, failed: {}, skipped: {}",
                summary.imported, summary.duplicates, summary.failed, summary.skipped
            ),
        };
    }

    if let Err(e) = journal.flush() {
        warn!("Cannot write import journal: {}", e);
    }
}

fn report_links(rx: Receiver<LinkProgress>) {
    let stdout = io::stdout();
    let mut linked = 0usize;

    for event in rx {
        let mut out = stdout.lock();
        let _ = match event {
            LinkProgress::Started { kind, total } => writeln!(out, "Linking {} photos by {}", total, kind),
            LinkProgress::Linked { .. } => {
                linked += 1;
                if linked % DOTS_PER_LINE == 0 {
                    writeln!(out, ". {}", linked)
                } else {
                    write!(out, ".").and_then(|_| out.flush())
                }
            }
            LinkProgress::Failed { path, message, .. } => {
                writeln!(out, "\nfail...{}: {}", path.display(), message)
            }
            LinkProgress::Completed(summary) => writeln!(
                out,
                "\nView {}: created: {}, existing: {}, failed: {}",
                summary.kind, summary.created, summary.existing, summary.failed
            ),
        };
    }
}
