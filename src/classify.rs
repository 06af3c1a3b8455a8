//! Extension-based routing of directory entries

use crate::config::Category;
use std::path::{Path, PathBuf};

/// Sidecar and metadata files that are never classified or copied
const IGNORED_NAMES: &[&str] = &[".ds_store", "thumbs.db", "zbthumbnail.info"];

const IGNORED_EXTENSIONS: &[&str] = &["thm"];

/// Images whose capture time is read from EXIF
const EXIF_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Other picture formats, named from filesystem time
const IMAGE_EXTENSIONS: &[&str] = &["gif", "png", "bmp", "mpo", "pdf"];

const MOVIE_EXTENSIONS: &[&str] = &["mov", "avi", "3gp", "mp4", "mpg"];

/// How a file is handled, decided from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Picture with embedded capture time
    ExifImage,
    /// Picture without EXIF lookup
    Image,
    Movie,
    /// Anything unrecognized
    Other,
}

impl FileKind {
    /// Route a lowercased extension (without the dot)
    pub fn from_extension(extension: &str) -> Self {
        if EXIF_IMAGE_EXTENSIONS.contains(&extension) {
            FileKind::ExifImage
        } else if IMAGE_EXTENSIONS.contains(&extension) {
            FileKind::Image
        } else if MOVIE_EXTENSIONS.contains(&extension) {
            FileKind::Movie
        } else {
            FileKind::Other
        }
    }

    pub fn category(&self) -> Category {
        match self {
            FileKind::ExifImage | FileKind::Image => Category::Pictures,
            FileKind::Movie => Category::Movies,
            FileKind::Other => Category::Others,
        }
    }

    pub fn reads_exif(&self) -> bool {
        matches!(self, FileKind::ExifImage)
    }
}

/// A single directory listing entry
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: PathBuf,
    /// Lowercased extension without the dot, empty when there is none
    pub extension: String,
    pub is_directory: bool,
}

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>, is_directory: bool) -> Self {
        let path = path.into();
        let extension = lowercase_extension(&path);
        Self {
            path,
            extension,
            is_directory,
        }
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_extension(&self.extension)
    }
}

/// Lowercased extension of a path, without the leading dot
pub fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Whether an entry is a sidecar or metadata file that must be skipped
pub fn is_ignored(path: &Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    let name = name.to_string_lossy().to_lowercase();
    if IGNORED_NAMES.contains(&name.as_str()) {
        return true;
    }

    IGNORED_EXTENSIONS.contains(&lowercase_extension(path).as_str())
}
