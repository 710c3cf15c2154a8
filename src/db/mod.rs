mod schema;
pub mod records;
pub mod transaction;

use rusqlite::{Connection, OpenFlags, TransactionBehavior};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::scanner::ExifFields;
use crate::views::ViewKind;

pub use records::{GroupKey, Photo, TableCounts, ViewRow};
pub use schema::SCHEMA;
pub use transaction::ArchiveTx;

/// The relational store of an archive. Owns the single connection used for
/// the whole run.
pub struct Archive {
    conn: Connection,
    path: PathBuf,
}

impl Archive {
    /// Create (or open) the database file at `path` and install the schema.
    pub fn create(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| Error::StoreOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let archive = Self::prepare(conn, path)?;
        archive.initialize()?;
        Ok(archive)
    }

    /// Open an existing database read-write. A missing file is an error,
    /// never silently created.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::validation(format!(
                "Database {} not found!",
                path.display()
            )));
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(|source| Error::StoreOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Self::prepare(conn, path)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let archive = Self::prepare(conn, Path::new(":memory:"))?;
        archive.initialize()?;
        Ok(archive)
    }

    /// SQLite opens lazily, so touch the file here to report an unusable
    /// database as an open failure rather than a later storage error.
    fn prepare(conn: Connection, path: &Path) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)
            .and_then(|_| conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0)))
            .map_err(|source| Error::StoreOpen {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` as one unit of work.
    ///
    /// The write lock is taken up front, so the id computed by
    /// [`ArchiveTx::next_photo_id`] and the insert that uses it see the same
    /// state. Any error returned by `f`, or by the commit itself, leaves the
    /// database exactly as it was.
    pub fn run_in_transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&ArchiveTx<'_>) -> Result<T>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let result = f(&ArchiveTx { conn: &tx });

        match result {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                debug!("Rolling back: {}", e);
                if let Err(rollback) = tx.rollback() {
                    warn!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    // ========================================================================
    // Read-only queries
    // ========================================================================

    /// Rows feeding one kind of view, joined with the table it groups by.
    pub fn view_rows(&self, kind: ViewKind) -> Result<Vec<ViewRow>> {
        let sql = match kind {
            ViewKind::Date => "SELECT Name, Date FROM Photos ORDER BY Id",
            ViewKind::Tag => {
                r#"
                SELECT Photos.Name, Photos.Date, Tags.Name
                FROM Photos INNER JOIN Tags ON Photos.Id = Tags.PhotoId
                ORDER BY Photos.Id, Tags.Id
                "#
            }
            ViewKind::Album => {
                r#"
                SELECT Photos.Name, Photos.Date, Albums.Name
                FROM Photos INNER JOIN Albums ON Photos.Id = Albums.PhotoId
                ORDER BY Photos.Id, Albums.Id
                "#
            }
            ViewKind::Size => {
                r#"
                SELECT Photos.Name, Photos.Date, Exif.ImageWidth, Exif.ImageHeight
                FROM Photos INNER JOIN Exif ON Photos.Id = Exif.PhotoId
                WHERE Exif.ImageWidth IS NOT NULL AND Exif.ImageHeight IS NOT NULL
                ORDER BY Photos.Id
                "#
            }
        };

        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| {
                let key = match kind {
                    ViewKind::Date => GroupKey::None,
                    ViewKind::Tag | ViewKind::Album => GroupKey::Label(row.get(2)?),
                    ViewKind::Size => GroupKey::Dimensions {
                        width: row.get(2)?,
                        height: row.get(3)?,
                    },
                };
                Ok(ViewRow {
                    name: row.get(0)?,
                    date: row.get(1)?,
                    key,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn photos(&self) -> Result<Vec<Photo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT Id, Name, Hash, Size, Date FROM Photos ORDER BY Id")?;
        let photos = stmt
            .query_map([], |row| {
                Ok(Photo {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    hash: row.get(2)?,
                    size: row.get::<_, i64>(3)? as u64,
                    date: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(photos)
    }

    pub fn tags_for(&self, photo_id: i64) -> Result<Vec<String>> {
        self.names_for("Tags", photo_id)
    }

    pub fn albums_for(&self, photo_id: i64) -> Result<Vec<String>> {
        self.names_for("Albums", photo_id)
    }

    fn names_for(&self, table: &str, photo_id: i64) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT Name FROM {table} WHERE PhotoId = ? ORDER BY Id"))?;
        let names = stmt
            .query_map([photo_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    pub fn exif_for(&self, photo_id: i64) -> Result<Option<ExifFields>> {
        let result = self.conn.query_row(
            r#"
            SELECT ImageDescription, Make, Model, Software, DateTime,
                   ImageWidth, ImageHeight, Latitude, Longitude, Altitude
            FROM Exif
            WHERE PhotoId = ?
            ORDER BY Id
            LIMIT 1
            "#,
            [photo_id],
            |row| {
                Ok(ExifFields {
                    image_description: row.get(0)?,
                    make: row.get(1)?,
                    model: row.get(2)?,
                    software: row.get(3)?,
                    date_time: row.get(4)?,
                    width: row.get(5)?,
                    height: row.get(6)?,
                    latitude: row.get(7)?,
                    longitude: row.get(8)?,
                    altitude: row.get(9)?,
                })
            },
        );
        match result {
            Ok(exif) => Ok(Some(exif)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn counts(&self) -> Result<TableCounts> {
        let count = |table: &str| -> Result<i64> {
            let n = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n)
        };

        Ok(TableCounts {
            photos: count("Photos")?,
            exif: count("Exif")?,
            tags: count("Tags")?,
            albums: count("Albums")?,
        })
    }
}
