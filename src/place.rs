//! Collision-safe placement of files into the destination tree
//!
//! A destination is never overwritten. When the computed path is taken the
//! file is either skipped or, with dedupe enabled, retried under `-2`, `-3`, ...
//! until a free name turns up.

use crate::config::{CategoryConfig, FileOperation};
use crate::error::{Error, Result};
use crate::naming::{self, DestinationCandidate};
use crate::progress::OutcomeKind;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info};

const COPY_BUFFER_SIZE: usize = 256 * 1024;

/// Result of placing one file
#[derive(Debug)]
pub enum Outcome {
    /// The file now exists at `destination` (or would, in a dry run)
    Created { destination: PathBuf },
    /// `destination` was already taken and dedupe is off; the source is untouched
    Skipped { destination: PathBuf },
    /// The file was abandoned
    Failed {
        destination: Option<PathBuf>,
        error: Error,
    },
}

impl Outcome {
    pub fn destination(&self) -> Option<&Path> {
        match self {
            Outcome::Created { destination } | Outcome::Skipped { destination } => {
                Some(destination)
            }
            Outcome::Failed { destination, .. } => destination.as_deref(),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Created { .. } => OutcomeKind::Created,
            Outcome::Skipped { .. } => OutcomeKind::Skipped,
            Outcome::Failed { .. } => OutcomeKind::Failed,
        }
    }
}

/// Destinations handed out during this run.
///
/// Checking a path and claiming it happen under one lock, so two workers
/// can never settle on the same name. Paths already on disk count as taken.
#[derive(Debug, Default)]
pub struct ClaimRegistry {
    claimed: Mutex<HashSet<PathBuf>>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `path` if nobody has it yet; returns false when it is taken
    pub fn claim(&self, path: &Path) -> bool {
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        if claimed.contains(path) || fs::symlink_metadata(path).is_ok() {
            return false;
        }
        claimed.insert(path.to_path_buf());
        true
    }

    /// Hand back a claim whose transfer never produced a file
    pub fn release(&self, path: &Path) {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
    }
}

/// Decides collision handling and performs the copy or move
#[derive(Debug)]
pub struct PlacementEngine {
    claims: ClaimRegistry,
    dry_run: bool,
    max_dedupe: u32,
}

impl PlacementEngine {
    pub fn new(dry_run: bool, max_dedupe: u32) -> Self {
        Self {
            claims: ClaimRegistry::new(),
            dry_run,
            max_dedupe,
        }
    }

    /// Place `source` under the name derived from `timestamp`
    pub fn place(
        &self,
        source: &Path,
        timestamp: &NaiveDateTime,
        config: &CategoryConfig,
        extension: &str,
    ) -> Outcome {
        let candidate = match self.claim_destination(source, timestamp, config, extension) {
            Ok(Some(candidate)) => candidate,
            Ok(None) => {
                let destination = naming::destination(timestamp, config, extension, None).path;
                info!(
                    source = %source.display(),
                    destination = %destination.display(),
                    "Destination exists, skipping"
                );
                return Outcome::Skipped { destination };
            }
            Err(e) => {
                error!(
                    source = %source.display(),
                    error = %e,
                    "Failed to find a free destination"
                );
                return Outcome::Failed {
                    destination: None,
                    error: e,
                };
            }
        };

        let destination = candidate.path;
        if !self.dry_run
            && let Err(e) = transfer(source, &destination, config.operation)
        {
            self.claims.release(&destination);
            error!(
                source = %source.display(),
                destination = %destination.display(),
                operation = config.operation.verb(),
                error = %e,
                "Failed to place file"
            );
            return Outcome::Failed {
                destination: Some(destination),
                error: e,
            };
        }

        info!(
            source = %source.display(),
            destination = %destination.display(),
            operation = config.operation.verb(),
            dedupe_suffix = ?candidate.dedupe_suffix,
            dry_run = self.dry_run,
            "Created"
        );
        Outcome::Created { destination }
    }

    /// Find and claim a free destination.
    ///
    /// `Ok(None)` means the first candidate is taken and dedupe is disabled.
    fn claim_destination(
        &self,
        source: &Path,
        timestamp: &NaiveDateTime,
        config: &CategoryConfig,
        extension: &str,
    ) -> Result<Option<DestinationCandidate>> {
        let mut suffix = None;
        loop {
            let candidate = naming::destination(timestamp, config, extension, suffix);
            if self.claims.claim(&candidate.path) {
                return Ok(Some(candidate));
            }
            if !config.dedupe {
                return Ok(None);
            }

            let next = suffix.map_or(2, |n: u32| n.saturating_add(1));
            if next > self.max_dedupe {
                return Err(Error::DedupeExhausted {
                    source_path: source.to_path_buf(),
                    attempts: self.max_dedupe,
                });
            }
            debug!(
                taken = %candidate.path.display(),
                next,
                "Destination taken, trying next suffix"
            );
            suffix = Some(next);
        }
    }
}

/// Copy or move `source` to a destination that is known to be free
fn transfer(source: &Path, destination: &Path, operation: FileOperation) -> Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| placement_error("create directory for", source, destination, e))?;
    }

    match operation {
        FileOperation::Copy => copy_file(source, destination),
        FileOperation::Move => {
            // Rename fails across filesystems
            if let Err(e) = fs::rename(source, destination) {
                debug!(source = %source.display(), error = %e, "Rename failed, copying instead");
                move_by_copy(source, destination)?;
            }
            Ok(())
        }
    }
}

/// Move by copying and then removing the source
fn move_by_copy(source: &Path, destination: &Path) -> Result<()> {
    copy_file(source, destination)?;
    fs::remove_file(source)
        .map_err(|e| placement_error("remove source after copying", source, destination, e))
}

/// Copy file contents into a new file, carrying over the modification time
fn copy_file(source: &Path, destination: &Path) -> Result<()> {
    let src_file = File::open(source).map_err(|e| placement_error("copy", source, destination, e))?;
    let dest_file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)
        .map_err(|e| placement_error("copy", source, destination, e))?;

    if let Err(e) = copy_contents(src_file, dest_file) {
        let _ = fs::remove_file(destination);
        return Err(placement_error("copy", source, destination, e));
    }

    if let Ok(metadata) = fs::metadata(source)
        && let Ok(mtime) = metadata.modified()
    {
        let _ = filetime::set_file_mtime(destination, filetime::FileTime::from_system_time(mtime));
    }

    Ok(())
}

fn copy_contents(source: File, destination: File) -> io::Result<()> {
    let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, source);
    let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, destination);

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        writer.write_all(&buffer[..bytes_read])?;
    }

    writer.flush()
}

fn placement_error(
    operation: &'static str,
    source: &Path,
    destination: &Path,
    error: io::Error,
) -> Error {
    Error::Placement {
        operation,
        source_path: source.to_path_buf(),
        destination: destination.to_path_buf(),
        source: error,
    }
}
