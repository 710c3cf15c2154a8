//! EXIF extraction from raw image bytes.

use exif::{Exif, In, Reader, Tag, Value};
use std::io::Cursor;

use crate::error::Result;

/// The EXIF fields the archive keeps for a photo. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifFields {
    pub image_description: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub software: Option<String>,
    pub date_time: Option<String>,

    pub width: Option<u32>,
    pub height: Option<u32>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
}

/// Parse the EXIF block of an image held in memory.
///
/// Fails with [`Error::MetadataParse`](crate::Error::MetadataParse) when the
/// bytes carry no readable EXIF container. Missing individual fields are not
/// an error.
pub fn parse_exif(bytes: &[u8]) -> Result<ExifFields> {
    let exif = Reader::new().read_from_container(&mut Cursor::new(bytes))?;

    let mut fields = ExifFields {
        image_description: ascii(&exif, Tag::ImageDescription),
        make: ascii(&exif, Tag::Make),
        model: ascii(&exif, Tag::Model),
        software: ascii(&exif, Tag::Software),
        date_time: ascii(&exif, Tag::DateTimeOriginal).or_else(|| ascii(&exif, Tag::DateTime)),
        width: uint(&exif, Tag::PixelXDimension).or_else(|| uint(&exif, Tag::ImageWidth)),
        height: uint(&exif, Tag::PixelYDimension).or_else(|| uint(&exif, Tag::ImageLength)),
        ..ExifFields::default()
    };

    // EXIF carried no dimensions, ask the image header instead
    if fields.width.is_none() || fields.height.is_none() {
        if let Some((w, h)) = header_dimensions(bytes) {
            fields.width = fields.width.or(Some(w));
            fields.height = fields.height.or(Some(h));
        }
    }

    if let (Some(lat), Some(lon)) = (
        coordinate(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, 'S'),
        coordinate(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, 'W'),
    ) {
        fields.latitude = Some(lat);
        fields.longitude = Some(lon);
    }

    if let Some(altitude) = rationals(&exif, Tag::GPSAltitude).and_then(|v| v.first().copied()) {
        let below_sea_level = exif
            .get_field(Tag::GPSAltitudeRef, In::PRIMARY)
            .and_then(|f| f.value.get_uint(0))
            == Some(1);
        fields.altitude = Some(if below_sea_level { -altitude } else { altitude });
    }

    Ok(fields)
}

fn ascii(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match field.value {
        Value::Ascii(ref parts) => {
            let text = parts
                .iter()
                .map(|p| String::from_utf8_lossy(p).trim_matches(char::from(0)).trim().to_string())
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            (!text.is_empty()).then_some(text)
        }
        _ => None,
    }
}

fn uint(exif: &Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)?.value.get_uint(0)
}

fn rationals(exif: &Exif, tag: Tag) -> Option<Vec<f64>> {
    match exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(ref v) => v
            .iter()
            .map(|r| (r.denom != 0).then(|| r.num as f64 / r.denom as f64))
            .collect(),
        _ => None,
    }
}

/// Degrees/minutes/seconds to signed decimal degrees.
fn coordinate(exif: &Exif, tag: Tag, ref_tag: Tag, negative: char) -> Option<f64> {
    let dms = rationals(exif, tag)?;
    if dms.len() < 3 {
        return None;
    }
    let value = dms[0] + dms[1] / 60.0 + dms[2] / 3600.0;

    let reference = ascii(exif, ref_tag).unwrap_or_default();
    Some(if reference.contains(negative) { -value } else { value })
}

fn header_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
