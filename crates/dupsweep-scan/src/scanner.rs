//! JWalk-based parallel directory scanner: enumerates candidate files and
//! buckets them by size ("Pass 1 — size bucketing").

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use dupsweep_core::{FileDescriptor, InodeInfo, InputError, ScanWarning, WarningKind};
use globset::{Glob, GlobSet, GlobSetBuilder};
use jwalk::{Parallelism, WalkDir};

use crate::cancel::CancellationToken;
use crate::inode::InodeTracker;
use crate::progress::{NullProgressSink, ProgressSink, ProgressTracker};

/// Result of a completed Pass 1 enumeration.
pub struct ScanResult {
    /// Candidate files bucketed by size; sizes with only one member can
    /// never contain a duplicate and are dropped by the caller before
    /// Pass 2.
    pub size_groups: HashMap<u64, Vec<FileDescriptor>>,
    pub warnings: Vec<ScanWarning>,
    pub files_scanned: u64,
    pub dirs_scanned: u64,
    pub elapsed: std::time::Duration,
}

/// Enumerates one or more root directories in parallel and groups
/// candidate files by size.
pub struct Scanner {
    min_size: u64,
    follow_symlinks: bool,
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
    worker_count: usize,
}

impl Scanner {
    pub fn new(min_size: u64, follow_symlinks: bool, worker_count: usize) -> Self {
        Self {
            min_size,
            follow_symlinks,
            include: None,
            exclude: None,
            worker_count,
        }
    }

    pub fn with_include(mut self, patterns: &[String]) -> Result<Self, InputError> {
        self.include = build_globset(patterns)?;
        Ok(self)
    }

    pub fn with_exclude(mut self, patterns: &[String]) -> Result<Self, InputError> {
        self.exclude = build_globset(patterns)?;
        Ok(self)
    }

    /// Scan `roots`, honoring `cancel` between directory entries and
    /// reporting progress to `sink` at a fixed cadence.
    pub fn scan(
        &self,
        roots: &[PathBuf],
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Result<ScanResult, InputError> {
        tracing::debug!(roots = ?roots, min_size = self.min_size, "starting scan");
        let start = Instant::now();
        let mut size_groups: HashMap<u64, Vec<FileDescriptor>> = HashMap::new();
        let mut warnings = Vec::new();
        let inode_tracker = InodeTracker::new();
        let mut tracker = ProgressTracker::new(sink);
        let mut dirs_scanned = 0u64;

        for root in roots {
            let canonical = root
                .canonicalize()
                .map_err(|_| InputError::MissingRoot { path: root.clone() })?;
            if !canonical.is_dir() {
                return Err(InputError::NotADirectory { path: canonical });
            }

            self.scan_root(
                &canonical,
                cancel,
                &inode_tracker,
                &mut size_groups,
                &mut warnings,
                &mut tracker,
                &mut dirs_scanned,
            );

            if cancel.is_cancelled() {
                warnings.push(ScanWarning::cancelled());
                break;
            }
        }

        tracker.finish(roots.first().map(PathBuf::as_path).unwrap_or(Path::new("")));

        let files_scanned: u64 = size_groups.values().map(|v| v.len() as u64).sum();
        tracing::info!(
            files_scanned,
            dirs_scanned,
            warnings = warnings.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "scan complete"
        );
        Ok(ScanResult {
            size_groups,
            warnings,
            files_scanned,
            dirs_scanned,
            elapsed: start.elapsed(),
        })
    }

    fn scan_root(
        &self,
        root: &Path,
        cancel: &CancellationToken,
        inode_tracker: &InodeTracker,
        size_groups: &mut HashMap<u64, Vec<FileDescriptor>>,
        warnings: &mut Vec<ScanWarning>,
        tracker: &mut ProgressTracker,
        dirs_scanned: &mut u64,
    ) {
        let parallelism = if self.worker_count == 0 {
            Parallelism::RayonDefaultPool {
                busy_timeout: std::time::Duration::from_millis(100),
            }
        } else {
            Parallelism::RayonNewPool(self.worker_count)
        };

        // Canonical paths of directories already descended into. Only needed
        // when following symlinks: jwalk itself doesn't break symlink
        // cycles, so a directory symlink loop (a/link -> a) would otherwise
        // be walked forever.
        let visited_dirs: Arc<Mutex<HashSet<PathBuf>>> = Arc::new(Mutex::new(HashSet::new()));
        visited_dirs.lock().expect("visited dirs lock poisoned").insert(root.to_path_buf());

        let follow_symlinks = self.follow_symlinks;
        let visited_for_filter = Arc::clone(&visited_dirs);

        let mut walker = WalkDir::new(root)
            .parallelism(parallelism)
            .follow_links(self.follow_symlinks)
            .skip_hidden(false);

        if follow_symlinks {
            walker = walker.process_read_dir(move |_depth, _path, _read_dir_state, children| {
                children.retain(|entry| {
                    let Ok(entry) = entry else { return true };
                    if !entry.file_type().is_dir() {
                        return true;
                    }
                    let Ok(canonical) = entry.path().canonicalize() else {
                        return true;
                    };
                    let mut visited = visited_for_filter.lock().expect("visited dirs lock poisoned");
                    visited.insert(canonical)
                });
            });
        }

        for entry_result in walker {
            if cancel.is_cancelled() {
                return;
            }

            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    tracing::warn!(?path, %err, "read error during scan");
                    warnings.push(ScanWarning::new(
                        path,
                        err.to_string(),
                        WarningKind::ReadError,
                    ));
                    tracker.record_warning();
                    continue;
                }
            };

            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy();

            if let Some(exclude) = &self.exclude {
                if exclude.is_match(file_name.as_ref()) || exclude.is_match(&path) {
                    continue;
                }
            }

            if entry.file_type().is_dir() {
                *dirs_scanned += 1;
                tracker.record_dir();
                continue;
            }

            if !entry.file_type().is_file() {
                continue;
            }

            if let Some(include) = &self.include {
                if !include.is_match(file_name.as_ref()) && !include.is_match(&path) {
                    continue;
                }
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    warnings.push(ScanWarning::new(
                        &path,
                        err.to_string(),
                        WarningKind::MetadataError,
                    ));
                    tracker.record_warning();
                    continue;
                }
            };

            let size = metadata.len();
            if size < self.min_size {
                continue;
            }

            let inode_info = InodeInfo::new(get_ino(&metadata), get_dev(&metadata));
            if get_nlink(&metadata) > 1 && !inode_tracker.track(inode_info) {
                // Already queued this physical file via a different hardlink.
                continue;
            }

            let (mtime_secs, mtime_nanos) = mtime_parts(&metadata);
            let mut descriptor = FileDescriptor::new(path.clone(), size, mtime_secs, mtime_nanos);
            descriptor.inode = Some(inode_info);

            tracker.record_file(size, &path);
            size_groups.entry(size).or_default().push(descriptor);
        }
    }
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>, InputError> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| InputError::InvalidConfig {
            message: format!("invalid glob pattern {pattern:?}: {e}"),
        })?;
        builder.add(glob);
    }
    let set = builder.build().map_err(|e| InputError::InvalidConfig {
        message: format!("failed to build glob set: {e}"),
    })?;
    Ok(Some(set))
}

fn mtime_parts(metadata: &std::fs::Metadata) -> (i64, u32) {
    match metadata.modified() {
        Ok(time) => match time.duration_since(std::time::UNIX_EPOCH) {
            Ok(d) => (d.as_secs() as i64, d.subsec_nanos()),
            Err(_) => (0, 0),
        },
        Err(_) => (0, 0),
    }
}

#[cfg(unix)]
fn get_dev(metadata: &std::fs::Metadata) -> u64 {
    metadata.dev()
}

#[cfg(not(unix))]
fn get_dev(_metadata: &std::fs::Metadata) -> u64 {
    0
}

#[cfg(unix)]
fn get_ino(metadata: &std::fs::Metadata) -> u64 {
    metadata.ino()
}

#[cfg(not(unix))]
fn get_ino(_metadata: &std::fs::Metadata) -> u64 {
    0
}

#[cfg(unix)]
fn get_nlink(metadata: &std::fs::Metadata) -> u64 {
    metadata.nlink()
}

#[cfg(not(unix))]
fn get_nlink(_metadata: &std::fs::Metadata) -> u64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir(root.join("dir1")).unwrap();
        fs::write(root.join("a.txt"), "hello").unwrap();
        fs::write(root.join("dir1/b.txt"), "hello").unwrap();
        fs::write(root.join("dir1/c.txt"), "different content").unwrap();
        temp
    }

    #[test]
    fn groups_same_size_files_together() {
        let temp = create_test_tree();
        let scanner = Scanner::new(0, false, 1);
        let result = scanner
            .scan(&[temp.path().to_path_buf()], &CancellationToken::new(), &NullProgressSink)
            .unwrap();

        let group = result.size_groups.get(&5).unwrap();
        assert_eq!(group.len(), 2);
    }

    #[test]
    fn respects_min_size() {
        let temp = create_test_tree();
        let scanner = Scanner::new(10, false, 1);
        let result = scanner
            .scan(&[temp.path().to_path_buf()], &CancellationToken::new(), &NullProgressSink)
            .unwrap();

        assert!(!result.size_groups.contains_key(&5));
    }

    #[test]
    fn missing_root_is_input_error() {
        let scanner = Scanner::new(0, false, 1);
        let result = scanner.scan(
            &[PathBuf::from("/does/not/exist/at/all")],
            &CancellationToken::new(),
            &NullProgressSink,
        );
        assert!(matches!(result, Err(InputError::MissingRoot { .. })));
    }

    #[test]
    fn exclude_pattern_drops_matching_files() {
        let temp = create_test_tree();
        let scanner = Scanner::new(0, false, 1)
            .with_exclude(&["*.txt".to_string()])
            .unwrap();
        let result = scanner
            .scan(&[temp.path().to_path_buf()], &CancellationToken::new(), &NullProgressSink)
            .unwrap();
        assert_eq!(result.files_scanned, 0);
    }

    #[test]
    fn cancellation_stops_traversal_early() {
        let temp = create_test_tree();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let scanner = Scanner::new(0, false, 1);
        let result = scanner
            .scan(&[temp.path().to_path_buf()], &cancel, &NullProgressSink)
            .unwrap();
        assert!(result.warnings.iter().any(|w| w.kind == WarningKind::Cancelled));
    }

    #[cfg(unix)]
    #[test]
    fn following_symlinks_does_not_loop_on_a_directory_cycle() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir(root.join("a")).unwrap();
        fs::write(root.join("a/file.txt"), "hello").unwrap();
        std::os::unix::fs::symlink(root, root.join("a/loop")).unwrap();

        let scanner = Scanner::new(0, true, 1);
        let result = scanner
            .scan(&[root.to_path_buf()], &CancellationToken::new(), &NullProgressSink)
            .unwrap();

        assert_eq!(result.files_scanned, 1);
    }
}
