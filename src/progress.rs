//! Progress reporting
//!
//! Workers never touch shared counters. They send immutable
//! [`ProgressEvent`]s over a channel, and a single sink thread owns
//! [`ProgressCounters`], returning them once every sender is dropped.

use crate::config::Category;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::fmt;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace};

/// Terminal state of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Created,
    Skipped,
    Failed,
}

/// Progress deltas emitted by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// All immediate children of a directory have been dispatched
    DirectoryListed { path: PathBuf },
    /// A file was routed to a category and queued for processing
    Queued { category: Category },
    /// A file is waiting for a slot in the EXIF stage
    Waiting { category: Category },
    /// A waiting file was admitted to the EXIF stage
    Admitted { category: Category },
    /// A file finished
    Finished {
        category: Category,
        outcome: OutcomeKind,
    },
}

/// Sending half handed to workers
#[derive(Clone)]
pub struct ProgressSender {
    inner: Sender<ProgressEvent>,
}

impl ProgressSender {
    /// Send an event; a dropped sink just means nobody is listening
    pub fn send(&self, event: ProgressEvent) {
        let _ = self.inner.send(event);
    }
}

/// Create a progress channel
pub fn channel() -> (ProgressSender, Receiver<ProgressEvent>) {
    let (inner, receiver) = unbounded();
    (ProgressSender { inner }, receiver)
}

/// Per-category counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub total: usize,
    pub waiting: usize,
    pub done: usize,
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Aggregated run progress
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressCounters {
    categories: [CategoryCounts; 3],
    /// Directories whose children have all been dispatched
    pub directories_listed: usize,
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: Category) -> &CategoryCounts {
        &self.categories[category.index()]
    }

    fn get_mut(&mut self, category: Category) -> &mut CategoryCounts {
        &mut self.categories[category.index()]
    }

    pub fn apply(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::DirectoryListed { .. } => self.directories_listed += 1,
            ProgressEvent::Queued { category } => self.get_mut(*category).total += 1,
            ProgressEvent::Waiting { category } => self.get_mut(*category).waiting += 1,
            ProgressEvent::Admitted { category } => {
                let counts = self.get_mut(*category);
                counts.waiting = counts.waiting.saturating_sub(1);
            }
            ProgressEvent::Finished { category, outcome } => {
                let counts = self.get_mut(*category);
                counts.done += 1;
                match outcome {
                    OutcomeKind::Created => counts.created += 1,
                    OutcomeKind::Skipped => counts.skipped += 1,
                    OutcomeKind::Failed => counts.failed += 1,
                }
            }
        }
    }

    /// Files that finished with a failure, across categories
    pub fn failed(&self) -> usize {
        self.categories.iter().map(|c| c.failed).sum()
    }

    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ProgressCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = Category::ALL
            .iter()
            .map(|category| {
                let c = self.get(*category);
                format!(
                    "{}: {}/{} done ({} created, {} skipped, {} failed)",
                    category, c.done, c.total, c.created, c.skipped, c.failed
                )
            })
            .collect();
        write!(
            f,
            "{}; directories: {}",
            parts.join(", "),
            self.directories_listed
        )
    }
}

/// The single owner of the progress counters
pub struct ProgressSink {
    handle: JoinHandle<ProgressCounters>,
}

impl ProgressSink {
    /// Start consuming events on a dedicated thread
    pub fn spawn(receiver: Receiver<ProgressEvent>) -> Self {
        let handle = thread::spawn(move || {
            let mut counters = ProgressCounters::new();
            for event in receiver.iter() {
                counters.apply(&event);
                if let ProgressEvent::Finished { category, .. } = &event {
                    let c = counters.get(*category);
                    trace!(
                        %category,
                        done = c.done,
                        total = c.total,
                        waiting = c.waiting,
                        "Progress"
                    );
                }
            }
            debug!("Progress sink drained");
            counters
        });
        Self { handle }
    }

    /// Wait for all senders to drop and return the final counters
    pub fn join(self) -> ProgressCounters {
        self.handle.join().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_apply_events() {
        let mut counters = ProgressCounters::new();
        counters.apply(&ProgressEvent::Queued {
            category: Category::Pictures,
        });
        counters.apply(&ProgressEvent::Waiting {
            category: Category::Pictures,
        });
        assert_eq!(counters.get(Category::Pictures).waiting, 1);

        counters.apply(&ProgressEvent::Admitted {
            category: Category::Pictures,
        });
        counters.apply(&ProgressEvent::Finished {
            category: Category::Pictures,
            outcome: OutcomeKind::Created,
        });
        counters.apply(&ProgressEvent::DirectoryListed {
            path: PathBuf::from("/src"),
        });

        let pictures = counters.get(Category::Pictures);
        assert_eq!(pictures.total, 1);
        assert_eq!(pictures.waiting, 0);
        assert_eq!(pictures.done, 1);
        assert_eq!(pictures.created, 1);
        assert_eq!(counters.get(Category::Movies), &CategoryCounts::default());
        assert_eq!(counters.directories_listed, 1);
    }

    #[test]
    fn test_sink_collects_from_many_threads() {
        let (sender, receiver) = channel();
        let sink = ProgressSink::spawn(receiver);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sender = sender.clone();
                thread::spawn(move || {
                    for _ in 0..25 {
                        sender.send(ProgressEvent::Finished {
                            category: Category::Movies,
                            outcome: OutcomeKind::Skipped,
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        drop(sender);

        let counters = sink.join();
        assert_eq!(counters.get(Category::Movies).done, 100);
        assert_eq!(counters.get(Category::Movies).skipped, 100);
        assert_eq!(counters.failed(), 0);
    }

    #[test]
    fn test_summary() {
        let mut counters = ProgressCounters::new();
        counters.apply(&ProgressEvent::Queued {
            category: Category::Others,
        });
        counters.apply(&ProgressEvent::Finished {
            category: Category::Others,
            outcome: OutcomeKind::Failed,
        });

        let summary = counters.summary();
        assert!(summary.contains("others: 1/1 done (0 created, 0 skipped, 1 failed)"));
        assert!(summary.contains("pictures: 0/0 done"));
        assert_eq!(counters.failed(), 1);
    }
}
