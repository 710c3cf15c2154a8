//! phodb: a photo archive with deduplicating import and derived symlink views.

pub mod commands;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod import;
pub mod layout;
pub mod logging;
pub mod scanner;
pub mod views;

pub use error::{Error, Result};
