//! Media Sorter - file photos and movies by the moment they were taken
//!
//! This library walks a source tree and places every recognized file under
//! a destination path derived from its timestamp:
//! - Extension-based routing into pictures, movies and others
//! - EXIF `DateTimeOriginal` for JPEG photos, filesystem birth time otherwise
//! - Moment-style name templates that may expand into nested directories
//! - Copy or move, never overwriting, with optional numeric dedupe suffixes
//! - Parallel processing with Rayon and a bounded EXIF read stage

pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod naming;
pub mod place;
pub mod process;
pub mod progress;
pub mod throttle;
pub mod time;

pub use cli::Cli;
pub use config::{Category, CategoryConfig, Config, FileOperation};
pub use error::{Error, Result};
pub use naming::NameTemplate;
pub use process::{Processor, organize};
pub use progress::ProgressCounters;
