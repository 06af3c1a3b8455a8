//! CLI argument parsing with clap

use crate::config::{
    CategoryConfig, Config, DEFAULT_EXIF_CONCURRENCY, DEFAULT_MAX_DEDUPE, DEFAULT_MOVIE_TEMPLATE,
    DEFAULT_PICTURE_TEMPLATE, FileOperation,
};
use crate::error::Result;
use crate::naming::NameTemplate;
use clap::Parser;
use std::path::PathBuf;

/// Media Sorter - file photos and movies by the moment they were taken
///
/// Walks a source directory, reads the EXIF capture time of JPEG photos
/// (falling back to the file's creation time) and copies or moves each
/// file into a destination tree named after that time.
#[derive(Parser, Debug)]
#[command(name = "media-sorter")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Source directory to scan
    #[arg(short = 's', long = "src", visible_alias = "source", alias = "s")]
    pub src: PathBuf,

    /// Descend into subdirectories
    #[arg(short = 'r', long, visible_alias = "recurse", alias = "r")]
    pub recursive: bool,

    /// Dry run: log what would happen without touching the filesystem
    #[arg(long)]
    pub noop: bool,

    /// Copy pictures into this directory
    #[arg(long, value_name = "DIR", conflicts_with = "movepictures")]
    pub copypictures: Option<PathBuf>,

    /// Move pictures into this directory
    #[arg(long, value_name = "DIR")]
    pub movepictures: Option<PathBuf>,

    /// Name template for pictures
    #[arg(long, value_name = "TEMPLATE", default_value = DEFAULT_PICTURE_TEMPLATE)]
    pub picture: String,

    /// Literal text appended to picture names
    #[arg(long, value_name = "TEXT", alias = "picturesuffix")]
    pub picturelabel: Option<String>,

    /// Copy movies into this directory
    #[arg(long, value_name = "DIR", conflicts_with = "movemovies")]
    pub copymovies: Option<PathBuf>,

    /// Move movies into this directory
    #[arg(long, value_name = "DIR")]
    pub movemovies: Option<PathBuf>,

    /// Name template for movies
    #[arg(long, value_name = "TEMPLATE", default_value = DEFAULT_MOVIE_TEMPLATE)]
    pub movie: String,

    /// Literal text appended to movie names
    #[arg(long, value_name = "TEXT", alias = "moviesuffix")]
    pub movielabel: Option<String>,

    /// Copy unrecognized files into this directory
    #[arg(long, value_name = "DIR", conflicts_with = "moveothers")]
    pub copyothers: Option<PathBuf>,

    /// Move unrecognized files into this directory
    #[arg(long, value_name = "DIR")]
    pub moveothers: Option<PathBuf>,

    /// Name template for unrecognized files
    #[arg(long, value_name = "TEMPLATE", default_value = DEFAULT_MOVIE_TEMPLATE)]
    pub other: String,

    /// Literal text appended to names of unrecognized files
    #[arg(long, value_name = "TEXT")]
    pub otherlabel: Option<String>,

    /// Literal text appended to every name, unless a category sets its own
    #[arg(long, value_name = "TEXT", alias = "label")]
    pub suffix: Option<String>,

    /// Add -2, -3, ... to names that are already taken instead of skipping
    #[arg(long)]
    pub dedupe: bool,

    /// Give up on a file after this many dedupe suffixes
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_DEDUPE)]
    pub max_dedupe: u32,

    /// Maximum number of EXIF reads in flight
    #[arg(long, value_name = "N", default_value_t = DEFAULT_EXIF_CONCURRENCY)]
    pub exif_concurrency: usize,

    /// Number of threads for parallel processing (0 = auto)
    #[arg(short = 't', long, default_value_t = 0)]
    pub threads: usize,

    /// Also write the log to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Write the log file as JSON
    #[arg(long, requires = "log_file")]
    pub json_log: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Convert CLI arguments to Config
    pub fn to_config(&self) -> Result<Config> {
        let mut config = Config::new(&self.src);
        config.recursive = self.recursive;
        config.dry_run = self.noop;
        config.threads = self.threads;
        config.exif_concurrency = self.exif_concurrency;
        config.max_dedupe = self.max_dedupe;

        config.pictures = self.category(
            self.copypictures.as_ref(),
            self.movepictures.as_ref(),
            &self.picture,
            self.picturelabel.as_deref(),
        )?;
        config.movies = self.category(
            self.copymovies.as_ref(),
            self.movemovies.as_ref(),
            &self.movie,
            self.movielabel.as_deref(),
        )?;
        config.others = self.category(
            self.copyothers.as_ref(),
            self.moveothers.as_ref(),
            &self.other,
            self.otherlabel.as_deref(),
        )?;

        Ok(config)
    }

    /// Build one category; `None` when neither a copy nor a move root was given
    fn category(
        &self,
        copy_to: Option<&PathBuf>,
        move_to: Option<&PathBuf>,
        template: &str,
        label: Option<&str>,
    ) -> Result<Option<CategoryConfig>> {
        let (destination, operation) = match (move_to, copy_to) {
            (Some(dir), _) => (dir, FileOperation::Move),
            (None, Some(dir)) => (dir, FileOperation::Copy),
            (None, None) => return Ok(None),
        };

        let label = label.or(self.suffix.as_deref()).unwrap_or_default();
        Ok(Some(
            CategoryConfig::new(destination, NameTemplate::parse(template)?)
                .with_label(label)
                .with_dedupe(self.dedupe)
                .with_operation(operation),
        ))
    }
}
