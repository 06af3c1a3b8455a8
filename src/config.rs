//! Configuration types for the media sorter

use crate::error::{Error, Result};
use crate::naming::NameTemplate;
use std::fmt;
use std::path::{Path, PathBuf};

/// Default template for pictures: nested year / month / day folders
pub const DEFAULT_PICTURE_TEMPLATE: &str = "YYYY/YYYY-MM/YYYY-MM-DD/YYYY-MM-DD-HH-mm-ss";

/// Default template for movies and other files: flat timestamp
pub const DEFAULT_MOVIE_TEMPLATE: &str = "YYYY-MM-DD-HH-mm-ss";

/// Default number of EXIF reads allowed in flight at once
pub const DEFAULT_EXIF_CONCURRENCY: usize = 10;

/// Default cap on numeric dedupe suffixes tried for a single file
pub const DEFAULT_MAX_DEDUPE: u32 = 9999;

/// One of the three independently configurable destination routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Pictures,
    Movies,
    Others,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Pictures, Category::Movies, Category::Others];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Pictures => "pictures",
            Category::Movies => "movies",
            Category::Others => "others",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Category::Pictures => 0,
            Category::Movies => 1,
            Category::Others => 2,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// File operation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileOperation {
    /// Copy files to destination
    #[default]
    Copy,
    /// Move files to destination (rename, or copy then delete across devices)
    Move,
}

impl FileOperation {
    pub fn verb(&self) -> &'static str {
        match self {
            FileOperation::Copy => "copy",
            FileOperation::Move => "move",
        }
    }
}

/// Destination settings for a single category
#[derive(Debug, Clone)]
pub struct CategoryConfig {
    /// Root directory files of this category are placed under
    pub destination: PathBuf,

    /// Template the resolved timestamp is rendered with
    pub template: NameTemplate,

    /// Literal text appended after the rendered timestamp
    pub label: String,

    /// Resolve collisions with a numeric suffix instead of skipping
    pub dedupe: bool,

    pub operation: FileOperation,
}

impl CategoryConfig {
    pub fn new(destination: impl Into<PathBuf>, template: NameTemplate) -> Self {
        Self {
            destination: destination.into(),
            template,
            label: String::new(),
            dedupe: false,
            operation: FileOperation::Copy,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    pub fn with_operation(mut self, operation: FileOperation) -> Self {
        self.operation = operation;
        self
    }
}

/// Configuration for a single run
#[derive(Debug, Clone)]
pub struct Config {
    /// Source directory root
    pub source: PathBuf,

    /// Descend into subdirectories
    pub recursive: bool,

    /// Log intended actions without touching the filesystem
    pub dry_run: bool,

    pub pictures: Option<CategoryConfig>,
    pub movies: Option<CategoryConfig>,
    pub others: Option<CategoryConfig>,

    /// Number of threads for parallel processing (0 = auto)
    pub threads: usize,

    /// Maximum number of EXIF reads in flight
    pub exif_concurrency: usize,

    /// Highest dedupe suffix tried before giving up on a file
    pub max_dedupe: u32,
}

impl Config {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            recursive: false,
            dry_run: false,
            pictures: None,
            movies: None,
            others: None,
            threads: 0,
            exif_concurrency: DEFAULT_EXIF_CONCURRENCY,
            max_dedupe: DEFAULT_MAX_DEDUPE,
        }
    }

    /// Destination settings for a category, `None` when it is not routed anywhere
    pub fn category(&self, category: Category) -> Option<&CategoryConfig> {
        match category {
            Category::Pictures => self.pictures.as_ref(),
            Category::Movies => self.movies.as_ref(),
            Category::Others => self.others.as_ref(),
        }
    }

    /// Check that the source root exists and is a directory
    pub fn validate(&self) -> Result<()> {
        if !is_directory(&self.source) {
            return Err(Error::InvalidSource {
                path: self.source.clone(),
            });
        }
        Ok(())
    }
}

fn is_directory(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}
