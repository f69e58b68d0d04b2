//! Scan progress reporting.

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// A snapshot of scan progress, handed to a [`ProgressSink`] periodically.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    pub files_scanned: u64,
    pub dirs_scanned: u64,
    pub bytes_scanned: u64,
    pub current_path: PathBuf,
    pub warnings_count: u64,
    pub elapsed: Duration,
}

impl ScanProgress {
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.files_scanned as f64 / secs
        } else {
            0.0
        }
    }
}

/// Which stage of the scan/hash pipeline just finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Pass 1: directory walk, bucketed by size.
    Enumerate,
    /// Pass 2: quick-hash, re-bucketed by (size, quick hash).
    QuickHash,
    /// Pass 3: full-hash, re-bucketed into duplicate groups.
    FullHash,
}

/// Callback invoked from the scanning thread as Pass 1 enumerates files.
/// Implementations must be cheap and non-blocking — they run on the hot
/// path of directory traversal.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: &ScanProgress);

    /// Called once after each pass finishes. Default no-op; a caller that
    /// wants per-pass telemetry (a progress bar, a metrics counter)
    /// overrides it.
    fn on_pass_complete(
        &self,
        _pass: Pass,
        _files_processed: u64,
        _total_candidates: u64,
        _bytes_read: u64,
    ) {
    }
}

/// A sink that drops every update; the default when the caller doesn't
/// want progress reporting.
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_progress(&self, _progress: &ScanProgress) {}
}

/// Internal accumulator driving [`ProgressSink`] calls at a fixed cadence.
pub(crate) struct ProgressTracker<'a> {
    start_time: Instant,
    files_scanned: u64,
    dirs_scanned: u64,
    bytes_scanned: u64,
    warnings_count: u64,
    sink: &'a dyn ProgressSink,
    emit_every: u64,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            start_time: Instant::now(),
            files_scanned: 0,
            dirs_scanned: 0,
            bytes_scanned: 0,
            warnings_count: 0,
            sink,
            emit_every: 1000,
        }
    }

    pub fn record_dir(&mut self) {
        self.dirs_scanned += 1;
    }

    pub fn record_warning(&mut self) {
        self.warnings_count += 1;
    }

    pub fn record_file(&mut self, size: u64, path: &std::path::Path) {
        self.files_scanned += 1;
        self.bytes_scanned += size;
        if self.files_scanned % self.emit_every == 0 {
            self.sink.on_progress(&ScanProgress {
                files_scanned: self.files_scanned,
                dirs_scanned: self.dirs_scanned,
                bytes_scanned: self.bytes_scanned,
                current_path: path.to_path_buf(),
                warnings_count: self.warnings_count,
                elapsed: self.start_time.elapsed(),
            });
        }
    }

    pub fn finish(&self, path: &std::path::Path) {
        self.sink.on_progress(&ScanProgress {
            files_scanned: self.files_scanned,
            dirs_scanned: self.dirs_scanned,
            bytes_scanned: self.bytes_scanned,
            current_path: path.to_path_buf(),
            warnings_count: self.warnings_count,
            elapsed: self.start_time.elapsed(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    struct RecordingSink {
        calls: AtomicU64,
        last: Mutex<Option<ScanProgress>>,
    }

    impl ProgressSink for RecordingSink {
        fn on_progress(&self, progress: &ScanProgress) {
            self.calls.fetch_add(1, Ordering::Relaxed);
            *self.last.lock().unwrap() = Some(progress.clone());
        }
    }

    #[test]
    fn emits_at_fixed_cadence() {
        let sink = RecordingSink {
            calls: AtomicU64::new(0),
            last: Mutex::new(None),
        };
        let mut tracker = ProgressTracker::new(&sink);
        for i in 0..2500u64 {
            tracker.record_file(10, &std::path::PathBuf::from(format!("/f{i}")));
        }
        assert_eq!(sink.calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn finish_always_emits() {
        let sink = RecordingSink {
            calls: AtomicU64::new(0),
            last: Mutex::new(None),
        };
        let tracker = ProgressTracker::new(&sink);
        tracker.finish(&std::path::PathBuf::from("/done"));
        assert_eq!(sink.calls.load(Ordering::Relaxed), 1);
    }
}
