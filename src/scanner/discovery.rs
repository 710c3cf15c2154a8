use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::config::ImportConfig;

/// Recursively collect every file under `directory` with an accepted extension.
///
/// Entries that cannot be read are logged and left out; they never abort the walk.
pub fn discover_images(directory: &Path, config: &ImportConfig) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for entry in WalkDir::new(directory).follow_links(config.follow_links) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", directory.display(), e);
                continue;
            }
        };

        if entry.file_type().is_file() && config.accepts(entry.path()) {
            images.push(entry.into_path());
        }
    }

    // Sort by path for consistent ordering
    images.sort();

    images
}
