//! Finding candidate photos on disk and reading their metadata.

pub mod discovery;
pub mod metadata;

pub use discovery::discover_images;
pub use metadata::{parse_exif, ExifFields};
