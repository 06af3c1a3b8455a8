//! Bounded admission to the EXIF read stage
//!
//! A bounded channel pre-filled with permits acts as a counting semaphore:
//! taking a permit blocks until one is free, dropping it hands it back.

use crossbeam_channel::{Receiver, Sender, bounded};

/// Limits how many EXIF reads are in flight at once
pub struct ExifGate {
    release: Sender<()>,
    acquire: Receiver<()>,
}

impl ExifGate {
    /// Create a gate admitting `capacity` concurrent readers (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (release, acquire) = bounded(capacity);
        for _ in 0..capacity {
            // Cannot fail: the channel has room for every permit and we hold the receiver
            let _ = release.send(());
        }
        Self { release, acquire }
    }

    /// Block until a permit is available
    pub fn acquire(&self) -> ExifPermit<'_> {
        // Both ends live in `self`, so the channel never disconnects while borrowed
        let _ = self.acquire.recv();
        ExifPermit { gate: self }
    }

    /// Take a permit only if one is free right now
    pub fn try_acquire(&self) -> Option<ExifPermit<'_>> {
        self.acquire.try_recv().ok().map(|_| ExifPermit { gate: self })
    }

    /// Number of permits currently free
    pub fn available(&self) -> usize {
        self.acquire.len()
    }
}

/// A held slot in the EXIF stage, released on drop
pub struct ExifPermit<'a> {
    gate: &'a ExifGate,
}

impl Drop for ExifPermit<'_> {
    fn drop(&mut self) {
        let _ = self.gate.release.send(());
    }
}
