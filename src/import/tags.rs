//! Tags and albums derived from where a file sits in the import tree.

use std::path::{Component, Path};

/// Tags for a file: every directory between the import root and the file,
/// split on `separators`, lower-cased, first occurrence kept.
///
/// Names are otherwise taken literally; no punctuation or unicode folding.
pub fn derive_tags(import_root: &Path, source: &Path, separators: &str) -> Vec<String> {
    let Some(relative) = source.parent().and_then(|dir| dir.strip_prefix(import_root).ok()) else {
        return Vec::new();
    };

    let mut tags: Vec<String> = Vec::new();
    for component in relative.components() {
        let Component::Normal(segment) = component else {
            continue;
        };

        for word in segment.to_string_lossy().split(|c: char| separators.contains(c)) {
            let tag = word.trim().to_lowercase();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }

    tags
}

/// The album of an import run is the base name of its root directory.
pub fn album_name(import_root: &Path) -> Option<String> {
    import_root
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty())
}
