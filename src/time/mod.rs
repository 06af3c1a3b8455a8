//! Timestamp resolution
//!
//! Every placed file is named after one moment in time:
//! - the EXIF capture time (`DateTimeOriginal`) for EXIF-aware images
//! - otherwise, or when the EXIF read fails, the filesystem birth time
//! - modification time where the filesystem does not report birth time

pub mod exif;

use crate::classify::FileKind;
use crate::error::Result;
use crate::throttle::ExifGate;
use chrono::{DateTime, Local, NaiveDateTime};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Source of the resolved timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSource {
    /// Extracted from EXIF metadata
    Exif,
    /// Filesystem creation time
    BirthTime,
    /// Filesystem modification time, when birth time is unavailable
    Modified,
}

/// The moment a file is named after
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTime {
    pub timestamp: NaiveDateTime,
    pub source: TimeSource,
}

/// Resolve the naming timestamp for a file.
///
/// EXIF reads pass through `gate`, which bounds how many run at once.
/// `on_wait` is called before blocking on the gate and `on_admit` once a
/// permit is held. EXIF failures are recovered locally by falling back
/// to filesystem time; only an unreadable file metadata is an error.
pub fn resolve_time(
    path: &Path,
    kind: FileKind,
    gate: &ExifGate,
    on_wait: impl FnOnce(),
    on_admit: impl FnOnce(),
) -> Result<ResolvedTime> {
    if kind.reads_exif() {
        on_wait();
        let permit = gate.acquire();
        on_admit();
        let extracted = exif::extract_exif_time(path);
        drop(permit);

        match extracted {
            Ok(timestamp) => {
                debug!(?path, "Extracted time from EXIF");
                return Ok(ResolvedTime {
                    timestamp,
                    source: TimeSource::Exif,
                });
            }
            Err(e) => {
                warn!(?path, error = %e, "Error reading EXIF data, using file creation time");
            }
        }
    }

    filesystem_time(path)
}

/// Birth time of a file, or its modification time where birth time is unsupported
pub fn filesystem_time(path: &Path) -> Result<ResolvedTime> {
    let metadata = fs::metadata(path)?;

    let (time, source) = match metadata.created() {
        Ok(created) => (created, TimeSource::BirthTime),
        Err(e) => {
            debug!(?path, error = %e, "Birth time unavailable, using modification time");
            (metadata.modified()?, TimeSource::Modified)
        }
    };

    let local: DateTime<Local> = time.into();
    Ok(ResolvedTime {
        timestamp: local.naive_local(),
        source,
    })
}
