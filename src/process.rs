//! Directory walking and the per-file pipeline
//!
//! The walker lists one directory at a time, routes each entry by extension
//! and spawns the work onto a Rayon scope:
//! - subdirectories (when recursive) are walked as their own jobs
//! - files go through timestamp resolution, naming and placement
//!
//! Sibling files never wait on each other; only EXIF reads are throttled.

use crate::classify::{FileEntry, is_ignored};
use crate::config::{Category, CategoryConfig, Config};
use crate::error::{Error, Result};
use crate::place::{Outcome, PlacementEngine};
use crate::progress::{self, ProgressCounters, ProgressEvent, ProgressSender, ProgressSink};
use crate::throttle::ExifGate;
use crate::time::resolve_time;
use rayon::Scope;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{Level, debug, error, info, span, trace, warn};
use walkdir::WalkDir;

/// Walks the source tree and files everything it finds
pub struct Processor {
    config: Config,
    gate: ExifGate,
    placement: PlacementEngine,
    events: ProgressSender,
    /// Canonical paths of directories already listed
    visited: Mutex<HashSet<PathBuf>>,
}

impl Processor {
    pub fn new(config: Config, events: ProgressSender) -> Self {
        let gate = ExifGate::new(config.exif_concurrency);
        let placement = PlacementEngine::new(config.dry_run, config.max_dedupe);
        Self {
            config,
            gate,
            placement,
            events,
            visited: Mutex::new(HashSet::new()),
        }
    }

    /// Process the whole source tree, returning once every job has finished
    pub fn run(&self) {
        let _span = span!(Level::INFO, "run", dry_run = self.config.dry_run).entered();
        info!(
            source = %self.config.source.display(),
            recursive = self.config.recursive,
            "Processing"
        );

        rayon::scope(|scope| self.walk(scope, self.config.source.clone()));
    }

    /// List the immediate children of `directory` and dispatch each one
    fn walk<'s>(&'s self, scope: &Scope<'s>, directory: PathBuf) {
        if !self.first_visit(&directory) {
            return;
        }
        debug!(directory = %directory.display(), "Listing directory");

        let entries = WalkDir::new(&directory)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| !is_ignored(e.path()));

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let e = Error::from(e);
                    warn!(
                        directory = %directory.display(),
                        error = %e,
                        "Error reading entry, skipping"
                    );
                    continue;
                }
            };

            let file_type = entry.file_type();
            let entry = FileEntry::new(entry.into_path(), file_type.is_dir());

            if entry.is_directory {
                if self.config.recursive {
                    scope.spawn(move |scope| self.walk(scope, entry.path));
                }
            } else if file_type.is_file() {
                self.dispatch(scope, entry);
            }
        }

        self.events.send(ProgressEvent::DirectoryListed { path: directory });
    }

    /// Record `directory`; false when it was listed before under any path.
    ///
    /// Followed symlinks can lead back to an ancestor, which would otherwise
    /// be walked forever.
    fn first_visit(&self, directory: &Path) -> bool {
        let canonical = match directory.canonicalize() {
            Ok(canonical) => canonical,
            Err(e) => {
                warn!(
                    directory = %directory.display(),
                    error = %e,
                    "Cannot resolve directory, skipping"
                );
                return false;
            }
        };

        let mut visited = self.visited.lock().unwrap_or_else(PoisonError::into_inner);
        if visited.insert(canonical) {
            return true;
        }
        warn!(directory = %directory.display(), "Directory already walked, skipping");
        false
    }

    /// Route a file to its category, or drop it when that category has no destination
    fn dispatch<'s>(&'s self, scope: &Scope<'s>, entry: FileEntry) {
        let category = entry.kind().category();
        let Some(config) = self.config.category(category) else {
            if category == Category::Others {
                warn!(path = %entry.path.display(), "Unrecognized file type");
            } else {
                trace!(path = %entry.path.display(), %category, "No destination configured");
            }
            return;
        };

        self.events.send(ProgressEvent::Queued { category });
        scope.spawn(move |_| {
            let outcome = self.process_file(&entry, config);
            self.events.send(ProgressEvent::Finished {
                category,
                outcome: outcome.kind(),
            });
        });
    }

    /// Resolve, name and place one file
    fn process_file(&self, entry: &FileEntry, config: &CategoryConfig) -> Outcome {
        let _span = span!(Level::DEBUG, "process_file", path = %entry.path.display()).entered();
        let kind = entry.kind();
        let category = kind.category();

        debug!(?kind, "Processing file");
        let time = match resolve_time(
            &entry.path,
            kind,
            &self.gate,
            || self.events.send(ProgressEvent::Waiting { category }),
            || self.events.send(ProgressEvent::Admitted { category }),
        ) {
            Ok(time) => time,
            Err(e) => {
                warn!(error = %e, "Error reading file metadata, skipping");
                return Outcome::Failed {
                    destination: None,
                    error: e,
                };
            }
        };
        debug!(source = ?time.source, timestamp = %time.timestamp, "Resolved timestamp");

        self.placement
            .place(&entry.path, &time.timestamp, config, &entry.extension)
    }
}

/// Validate `config`, process the source tree and return the final counters
pub fn organize(config: Config) -> Result<ProgressCounters> {
    config.validate()?;

    let (sender, receiver) = progress::channel();
    let sink = ProgressSink::spawn(receiver);

    let processor = Processor::new(config, sender);
    processor.run();
    drop(processor);

    let counters = sink.join();
    if counters.failed() > 0 {
        error!(failed = counters.failed(), "Some files could not be placed");
    }
    info!("{}", counters.summary());
    Ok(counters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileOperation;
    use crate::naming::NameTemplate;
    use crate::time::exif::tests::jpeg_with_exif;
    use crate::time::filesystem_time;
    use std::collections::HashSet;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn category(root: &Path, template: &str) -> CategoryConfig {
        CategoryConfig::new(root, NameTemplate::parse(template).unwrap())
    }

    /// Every file below `root`, relative to it
    fn files_under(root: &Path) -> HashSet<PathBuf> {
        WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
            .collect()
    }

    #[test]
    fn test_pictures_and_movies_scenario() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("photo1.jpg"), jpeg_with_exif("2023:05:01 10:00:00")).unwrap();
        fs::write(src.join("clip1.mov"), b"movie bytes").unwrap();
        let clip_time = filesystem_time(&src.join("clip1.mov")).unwrap().timestamp;

        let pictures = dir.path().join("pictures");
        let movies = dir.path().join("movies");
        let mut config = Config::new(&src);
        config.pictures = Some(category(&pictures, "YYYY-MM-DD"));
        config.movies = Some(category(&movies, "YYYY-MM-DD-HH-mm-ss"));

        let counters = organize(config).unwrap();

        assert!(pictures.join("2023-05-01.jpg").is_file());
        let movie_name = format!("{}.mov", clip_time.format("%Y-%m-%d-%H-%M-%S"));
        assert_eq!(fs::read(movies.join(movie_name)).unwrap(), b"movie bytes");
        assert_eq!(counters.get(Category::Pictures).created, 1);
        assert_eq!(counters.get(Category::Movies).created, 1);
        assert_eq!(counters.directories_listed, 1);
        // Copies leave the sources in place
        assert!(src.join("photo1.jpg").exists());
        assert!(src.join("clip1.mov").exists());
    }

    #[test]
    fn test_second_run_skips_everything() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("a.jpg"), jpeg_with_exif("2020:01:01 08:00:00")).unwrap();
        fs::write(src.join("b.jpg"), jpeg_with_exif("2020:01:02 08:00:00")).unwrap();

        let pictures = dir.path().join("pictures");
        let mut config = Config::new(&src);
        config.pictures = Some(category(&pictures, "YYYY/YYYY-MM-DD"));

        let first = organize(config.clone()).unwrap();
        let placed = files_under(&pictures);
        let second = organize(config).unwrap();

        assert_eq!(first.get(Category::Pictures).created, 2);
        assert_eq!(second.get(Category::Pictures).created, 0);
        assert_eq!(second.get(Category::Pictures).skipped, 2);
        assert_eq!(files_under(&pictures), placed);
        assert_eq!(placed.len(), 2);
    }

    #[test]
    fn test_dedupe_keeps_every_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir(&src).unwrap();
        let mut bodies = HashSet::new();
        for name in ["a", "b", "c"] {
            let mut body = jpeg_with_exif("2023:05:01 10:00:00");
            body.extend_from_slice(name.as_bytes());
            fs::write(src.join(format!("{name}.jpg")), &body).unwrap();
            bodies.insert(body);
        }

        let pictures = dir.path().join("pictures");
        let mut config = Config::new(&src);
        config.pictures = Some(category(&pictures, "YYYY-MM-DD").with_dedupe(true));

        organize(config).unwrap();

        let expected: HashSet<PathBuf> = ["2023-05-01.jpg", "2023-05-01-2.jpg", "2023-05-01-3.jpg"]
            .into_iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(files_under(&pictures), expected);

        let placed: HashSet<Vec<u8>> = expected
            .iter()
            .map(|name| fs::read(pictures.join(name)).unwrap())
            .collect();
        assert_eq!(placed, bodies);
    }

    #[test]
    fn test_move_empties_source() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("photo.JPG"), jpeg_with_exif("2019:12:31 23:59:59")).unwrap();

        let pictures = dir.path().join("pictures");
        let mut config = Config::new(&src);
        config.pictures = Some(
            category(&pictures, "YYYY-MM-DD-HH-mm-ss").with_operation(FileOperation::Move),
        );

        organize(config).unwrap();

        assert!(!src.join("photo.JPG").exists());
        assert_eq!(
            fs::read(pictures.join("2019-12-31-23-59-59.jpg")).unwrap(),
            jpeg_with_exif("2019:12:31 23:59:59")
        );
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("photo.jpg"), jpeg_with_exif("2023:05:01 10:00:00")).unwrap();
        fs::write(src.join("clip.mp4"), b"clip").unwrap();

        let pictures = dir.path().join("pictures");
        let movies = dir.path().join("movies");
        let mut config = Config::new(&src);
        config.dry_run = true;
        config.pictures =
            Some(category(&pictures, "YYYY-MM-DD").with_operation(FileOperation::Move));
        config.movies = Some(category(&movies, "YYYY").with_operation(FileOperation::Move));

        let counters = organize(config).unwrap();

        assert_eq!(counters.get(Category::Pictures).created, 1);
        assert_eq!(counters.get(Category::Movies).created, 1);
        assert!(!pictures.exists());
        assert!(!movies.exists());
        assert_eq!(files_under(&src).len(), 2);
    }

    #[test]
    fn test_ignored_files_are_never_touched() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir(&src).unwrap();
        for name in [".DS_Store", "Thumbs.db", "ZbThumbnail.info", "MVI_0001.THM", "notes.txt"] {
            fs::write(src.join(name), name).unwrap();
        }

        let others = dir.path().join("others");
        let mut config = Config::new(&src);
        config.others = Some(category(&others, "[file]").with_dedupe(true));

        let counters = organize(config).unwrap();

        assert_eq!(counters.get(Category::Others).total, 1);
        assert_eq!(
            files_under(&others),
            HashSet::from([PathBuf::from("file.txt")])
        );
    }

    #[test]
    fn test_unconfigured_categories_are_dropped() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("clip.avi"), b"clip").unwrap();
        fs::write(src.join("notes.txt"), b"notes").unwrap();
        fs::write(src.join("image.png"), b"png").unwrap();

        let pictures = dir.path().join("pictures");
        let mut config = Config::new(&src);
        config.pictures = Some(category(&pictures, "[img]"));

        let counters = organize(config).unwrap();

        assert_eq!(counters.get(Category::Pictures).created, 1);
        assert_eq!(counters.get(Category::Movies).total, 0);
        assert_eq!(counters.get(Category::Others).total, 0);
        assert!(pictures.join("img.png").is_file());
    }

    #[test]
    fn test_recursion_flag() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let nested = src.join("2023").join("trip");
        fs::create_dir_all(&nested).unwrap();
        fs::write(src.join("top.jpg"), jpeg_with_exif("2023:01:01 00:00:00")).unwrap();
        fs::write(nested.join("deep.jpg"), jpeg_with_exif("2023:02:02 00:00:00")).unwrap();

        let flat_out = dir.path().join("flat");
        let mut config = Config::new(&src);
        config.pictures = Some(category(&flat_out, "YYYY-MM-DD"));
        let flat = organize(config.clone()).unwrap();

        assert_eq!(flat.directories_listed, 1);
        assert_eq!(
            files_under(&flat_out),
            HashSet::from([PathBuf::from("2023-01-01.jpg")])
        );

        let deep_out = dir.path().join("deep");
        config.recursive = true;
        config.pictures = Some(category(&deep_out, "YYYY-MM-DD"));
        let deep = organize(config).unwrap();

        assert_eq!(deep.directories_listed, 3);
        assert_eq!(
            files_under(&deep_out),
            HashSet::from([PathBuf::from("2023-01-01.jpg"), PathBuf::from("2023-02-02.jpg")])
        );
    }

    #[test]
    fn test_many_images_through_a_narrow_gate() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir(&src).unwrap();
        for i in 0..25 {
            let stamp = format!("2022:03:04 05:06:{i:02}");
            fs::write(src.join(format!("{i}.jpeg")), jpeg_with_exif(&stamp)).unwrap();
        }

        let pictures = dir.path().join("pictures");
        let mut config = Config::new(&src);
        config.exif_concurrency = 2;
        config.pictures = Some(category(&pictures, "HH-mm-ss"));

        let counters = organize(config).unwrap();

        let pictures_counts = counters.get(Category::Pictures);
        assert_eq!(pictures_counts.created, 25);
        assert_eq!(pictures_counts.waiting, 0);
        assert!(pictures.join("05-06-24.jpeg").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_entry_does_not_stop_the_walk() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("photo.jpg"), jpeg_with_exif("2023:05:01 10:00:00")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("nowhere.jpg"), src.join("dangling.jpg"))
            .unwrap();

        let pictures = dir.path().join("pictures");
        let mut config = Config::new(&src);
        config.recursive = true;
        config.pictures = Some(category(&pictures, "YYYY-MM-DD"));

        let counters = organize(config).unwrap();

        assert_eq!(counters.get(Category::Pictures).created, 1);
        assert_eq!(counters.failed(), 0);
        assert!(pictures.join("2023-05-01.jpg").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_to_ancestor_is_walked_once() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let nested = src.join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("photo.jpg"), jpeg_with_exif("2023:05:01 10:00:00")).unwrap();
        std::os::unix::fs::symlink(&src, nested.join("back")).unwrap();

        let pictures = dir.path().join("pictures");
        let mut config = Config::new(&src);
        config.recursive = true;
        config.pictures = Some(category(&pictures, "YYYY-MM-DD").with_dedupe(true));

        let counters = organize(config).unwrap();

        assert_eq!(counters.directories_listed, 2);
        assert_eq!(counters.get(Category::Pictures).total, 1);
        assert_eq!(
            files_under(&pictures),
            HashSet::from([PathBuf::from("2023-05-01.jpg")])
        );
    }

    #[test]
    fn test_invalid_source_is_rejected() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().join("missing"));
        assert!(organize(config).is_err());
    }
}
