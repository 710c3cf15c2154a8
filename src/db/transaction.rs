//! Write operations, available only inside [`Archive::run_in_transaction`].
//!
//! [`Archive::run_in_transaction`]: super::Archive::run_in_transaction

use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension};

use super::records::Photo;
use crate::error::Result;
use crate::scanner::ExifFields;

/// Handle on an open transaction. Every read and write made through it
/// commits or rolls back together.
pub struct ArchiveTx<'a> {
    pub(super) conn: &'a Connection,
}

impl ArchiveTx<'_> {
    /// `max(Id) + 1`, or 1 for an empty archive.
    ///
    /// Only safe because the archive has a single writer: two processes
    /// importing at once could compute the same id.
    pub fn next_photo_id(&self) -> Result<i64> {
        let id = self.conn.query_row(
            "SELECT COALESCE(MAX(Id), 0) + 1 FROM Photos",
            [],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Exact match on hash, size and date; name and original path play no part.
    pub fn find_duplicate(&self, hash: &str, size: u64, date: NaiveDateTime) -> Result<Option<Photo>> {
        let photo = self
            .conn
            .query_row(
                r#"
                SELECT Id, Name, Hash, Size, Date
                FROM Photos
                WHERE Hash = ?1 AND Size = ?2 AND Date = ?3
                ORDER BY Id
                LIMIT 1
                "#,
                rusqlite::params![hash, size as i64, date],
                |row| {
                    Ok(Photo {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        hash: row.get(2)?,
                        size: row.get::<_, i64>(3)? as u64,
                        date: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(photo)
    }

    /// Fails on a canonical name that is already taken.
    pub fn insert_photo(&self, photo: &Photo) -> Result<()> {
        self.conn.execute(
            "INSERT INTO Photos (Id, Name, Hash, Size, Date) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![photo.id, photo.name, photo.hash, photo.size as i64, photo.date],
        )?;
        Ok(())
    }

    pub fn insert_exif(&self, photo_id: i64, exif: &ExifFields) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO Exif (
                ImageDescription, Make, Model, Software, DateTime,
                ImageWidth, ImageHeight,
                Latitude, Longitude, Altitude,
                PhotoId
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            rusqlite::params![
                exif.image_description,
                exif.make,
                exif.model,
                exif.software,
                exif.date_time,
                exif.width,
                exif.height,
                exif.latitude,
                exif.longitude,
                exif.altitude,
                photo_id,
            ],
        )?;
        Ok(())
    }

    /// Returns whether a row was added.
    pub fn insert_tag_if_absent(&self, name: &str, photo_id: i64) -> Result<bool> {
        self.insert_association_if_absent("Tags", name, photo_id)
    }

    /// Returns whether a row was added.
    pub fn insert_album_if_absent(&self, name: &str, photo_id: i64) -> Result<bool> {
        self.insert_association_if_absent("Albums", name, photo_id)
    }

    fn insert_association_if_absent(&self, table: &str, name: &str, photo_id: i64) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE Name = ?1 AND PhotoId = ?2)"),
            rusqlite::params![name, photo_id],
            |row| row.get(0),
        )?;
        if exists {
            return Ok(false);
        }

        self.conn.execute(
            &format!("INSERT INTO {table} (Name, PhotoId) VALUES (?1, ?2)"),
            rusqlite::params![name, photo_id],
        )?;
        Ok(true)
    }
}
