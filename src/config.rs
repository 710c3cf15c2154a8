use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, IoResultExt, Result};
use crate::views::ViewKind;

/// Name of the configuration file kept at the archive root.
pub const CONFIG_FILE: &str = "phodb.toml";

/// Environment variable that points at an alternative configuration file.
pub const CONFIG_ENV: &str = "PHODB_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// File name of the relational store, relative to the archive root.
    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub views: ViewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    /// Characters that split a directory name into several tags.
    #[serde(default = "default_tag_separators")]
    pub tag_separators: String,

    #[serde(default)]
    pub follow_links: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Views built by `link` when none are given on the command line.
    #[serde(default = "default_view_kinds")]
    pub default_kinds: Vec<ViewKind>,

    /// Clear each view directory before linking.
    #[serde(default)]
    pub rebuild: bool,
}

fn default_database() -> String {
    "database.s3db".to_string()
}

fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "bmp".to_string(),
        "tiff".to_string(),
        "tif".to_string(),
    ]
}

fn default_tag_separators() -> String {
    "-".to_string()
}

fn default_view_kinds() -> Vec<ViewKind> {
    vec![ViewKind::Date]
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
            tag_separators: default_tag_separators(),
            follow_links: false,
        }
    }
}

impl ImportConfig {
    /// Case-insensitive check against the configured extensions.
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.image_extensions.iter().any(|e| e.to_lowercase() == ext))
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            default_kinds: default_view_kinds(),
            rebuild: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            import: ImportConfig::default(),
            views: ViewConfig::default(),
        }
    }
}

impl Config {
    /// Load the configuration for the archive at `root`.
    ///
    /// `PHODB_CONFIG` wins over `<root>/phodb.toml`; when neither exists the
    /// defaults are used.
    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::config_path(root);
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_path(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content).with_path(path)?;

        Ok(())
    }

    pub fn config_path(root: &Path) -> PathBuf {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => root.join(CONFIG_FILE),
        }
    }
}
