//! EXIF capture time extraction for images

use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime};
use exif::{In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::trace;

/// Read `DateTimeOriginal` from the primary image's EXIF data
pub fn extract_exif_time(path: &Path) -> Result<NaiveDateTime> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let exif = Reader::new()
        .read_from_container(&mut reader)
        .map_err(|e| Error::ExifRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let field = exif
        .get_field(Tag::DateTimeOriginal, In::PRIMARY)
        .ok_or_else(|| Error::ExifRead {
            path: path.to_path_buf(),
            message: "no DateTimeOriginal field".to_string(),
        })?;

    let parse_error = |message: String| Error::TimestampParse {
        source_info: path.display().to_string(),
        message,
    };

    let Value::Ascii(ref values) = field.value else {
        return Err(parse_error(format!(
            "DateTimeOriginal is not ASCII: {:?}",
            field.value
        )));
    };
    let raw = values
        .first()
        .ok_or_else(|| parse_error("DateTimeOriginal is empty".to_string()))?;

    let datetime = parse_exif_datetime(raw).ok_or_else(|| {
        parse_error(format!(
            "unrecognized DateTimeOriginal {:?}",
            String::from_utf8_lossy(raw)
        ))
    })?;

    trace!(?path, %datetime, "Found EXIF date");
    Ok(datetime)
}

/// Parse an EXIF ASCII datetime, normally `YYYY:MM:DD HH:MM:SS`
fn parse_exif_datetime(raw: &[u8]) -> Option<NaiveDateTime> {
    if let Ok(dt) = exif::DateTime::from_ascii(raw)
        && let Some(datetime) =
            NaiveDate::from_ymd_opt(dt.year.into(), dt.month.into(), dt.day.into()).and_then(
                |date| date.and_hms_opt(dt.hour.into(), dt.minute.into(), dt.second.into()),
            )
    {
        return Some(datetime);
    }

    // Some writers use other separators
    let text = String::from_utf8_lossy(raw);
    let text = text.trim().trim_matches('"').trim_end_matches('\0');
    let formats = [
        "%Y:%m:%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
    ];

    formats
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use tempfile::tempdir;

    /// A minimal JPEG whose APP1 segment carries only `DateTimeOriginal`
    pub(crate) fn jpeg_with_exif(datetime: &str) -> Vec<u8> {
        let mut value = datetime.as_bytes().to_vec();
        value.push(0);
        assert_eq!(value.len(), 20, "EXIF datetimes are 19 characters");

        let mut tiff = Vec::new();
        // Little-endian header, IFD0 at offset 8
        tiff.extend_from_slice(b"II");
        tiff.extend_from_slice(&42u16.to_le_bytes());
        tiff.extend_from_slice(&8u32.to_le_bytes());
        // IFD0: one entry pointing at the Exif IFD (offset 26)
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&0x8769u16.to_le_bytes());
        tiff.extend_from_slice(&4u16.to_le_bytes());
        tiff.extend_from_slice(&1u32.to_le_bytes());
        tiff.extend_from_slice(&26u32.to_le_bytes());
        tiff.extend_from_slice(&0u32.to_le_bytes());
        // Exif IFD: DateTimeOriginal, ASCII, 20 bytes at offset 44
        tiff.extend_from_slice(&1u16.to_le_bytes());
        tiff.extend_from_slice(&0x9003u16.to_le_bytes());
        tiff.extend_from_slice(&2u16.to_le_bytes());
        tiff.extend_from_slice(&20u32.to_le_bytes());
        tiff.extend_from_slice(&44u32.to_le_bytes());
        tiff.extend_from_slice(&0u32.to_le_bytes());
        tiff.extend_from_slice(&value);

        let mut app1 = b"Exif\0\0".to_vec();
        app1.extend_from_slice(&tiff);

        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
        jpeg.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
        jpeg.extend_from_slice(&app1);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    #[test]
    fn test_parse_exif_datetime() {
        let dt = parse_exif_datetime(b"2024:01:15 14:30:00").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 1);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 14);
        assert_eq!(dt.minute(), 30);
        assert_eq!(dt.second(), 0);

        let dt = parse_exif_datetime(b"2024-01-15 14:30:00").unwrap();
        assert_eq!(dt.year(), 2024);

        let dt = parse_exif_datetime(b"2024/01/15 14:30:00").unwrap();
        assert_eq!(dt.day(), 15);

        assert!(parse_exif_datetime(b"invalid").is_none());
        assert!(parse_exif_datetime(b"    :  :     :  :  ").is_none());
    }

    #[test]
    fn test_extract_from_jpeg() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, jpeg_with_exif("2023:05:01 10:00:00")).unwrap();

        let dt = extract_exif_time(&path).unwrap();
        assert_eq!(dt.to_string(), "2023-05-01 10:00:00");
    }

    #[test]
    fn test_extract_without_exif_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.jpg");
        std::fs::write(&path, b"not really a jpeg").unwrap();

        assert!(matches!(
            extract_exif_time(&path),
            Err(Error::ExifRead { .. })
        ));
    }
}
