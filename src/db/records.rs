//! Row types of the four archive tables.

use chrono::NaiveDateTime;

use crate::content::ContentIdentity;

/// A photo stored in `bulk/` under its canonical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub id: i64,
    pub name: String,
    pub hash: String,
    pub size: u64,
    pub date: NaiveDateTime,
}

impl Photo {
    pub fn new(id: i64, name: String, identity: &ContentIdentity) -> Self {
        Self {
            id,
            name,
            hash: identity.hash.clone(),
            size: identity.size,
            date: identity.modified,
        }
    }
}

/// What a view groups a photo row by, as read from the joined table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKey {
    /// Plain photo scan, the date alone decides the group.
    None,
    /// Tag or album name.
    Label(String),
    Dimensions { width: u32, height: u32 },
}

/// One row feeding a view: which bulk file, when, and what it is grouped by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRow {
    pub name: String,
    pub date: NaiveDateTime,
    pub key: GroupKey,
}

/// Row counts of every table, mostly for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub photos: i64,
    pub exif: i64,
    pub tags: i64,
    pub albums: i64,
}
