pub const SCHEMA: &str = r#"
-- Photos: one row per distinct (Hash, Size, Date), named by its canonical bulk file
CREATE TABLE IF NOT EXISTS Photos (
    Id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    Name VARCHAR(32) UNIQUE NOT NULL,
    Hash VARCHAR(32) NOT NULL,
    Size INTEGER NOT NULL,
    Date TIMESTAMP NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_photos_identity ON Photos(Hash, Size, Date);

-- Exif: optional 1:1 extension of a photo
CREATE TABLE IF NOT EXISTS Exif (
    Id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    ImageDescription VARCHAR(1024) NULL,
    Make VARCHAR(1024) NULL,
    Model VARCHAR(1024) NULL,
    Software VARCHAR(1024) NULL,
    DateTime VARCHAR(1024) NULL,
    ImageWidth INTEGER NULL,
    ImageHeight INTEGER NULL,
    Latitude FLOAT NULL,
    Longitude FLOAT NULL,
    Altitude FLOAT NULL,
    PhotoId INTEGER NOT NULL REFERENCES Photos(Id)
);

CREATE INDEX IF NOT EXISTS idx_exif_photo ON Exif(PhotoId);

-- Tags: words taken from the directory a photo was imported from
CREATE TABLE IF NOT EXISTS Tags (
    Id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    Name VARCHAR(1024) NOT NULL,
    PhotoId INTEGER NOT NULL REFERENCES Photos(Id)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_tags_photo_name ON Tags(PhotoId, Name);

-- Albums: the import root a photo was brought in with
CREATE TABLE IF NOT EXISTS Albums (
    Id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    Name VARCHAR(1024) NOT NULL,
    PhotoId INTEGER NOT NULL REFERENCES Photos(Id)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_albums_photo_name ON Albums(PhotoId, Name);
"#;
