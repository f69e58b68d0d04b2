//! Append-only audit log: one JSON object per line, fsync'd after every
//! entry, rotated by size.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use dupsweep_core::{ActionKind, AuditEntry, CacheError, Outcome};

const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_RETAIN: usize = 10;

/// Writes [`AuditEntry`] records to `audit/audit-*.log` under a data
/// directory, rotating the active file once it exceeds `max_bytes`.
pub struct AuditLog {
    dir: PathBuf,
    max_bytes: u64,
    retain: usize,
    file: Mutex<File>,
    bytes_written: AtomicU64,
    next_seq: AtomicU64,
}

impl AuditLog {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        Self::with_limits(dir, DEFAULT_MAX_BYTES, DEFAULT_RETAIN)
    }

    pub fn with_limits(
        dir: impl Into<PathBuf>,
        max_bytes: u64,
        retain: usize,
    ) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::Io(e.to_string()))?;

        let active = active_path(&dir);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&active)
            .map_err(|e| CacheError::Io(e.to_string()))?;
        let bytes_written = file.metadata().map(|m| m.len()).unwrap_or(0);
        let next_seq = last_seq(&active).map(|s| s + 1).unwrap_or(0);

        Ok(Self {
            dir,
            max_bytes,
            retain,
            file: Mutex::new(file),
            bytes_written: AtomicU64::new(bytes_written),
            next_seq: AtomicU64::new(next_seq),
        })
    }

    /// Append one entry, fsync, and rotate if the active file has grown
    /// past `max_bytes`. Returns the entry's assigned sequence number.
    pub fn record(
        &self,
        action: ActionKind,
        src: PathBuf,
        dst: Option<PathBuf>,
        outcome: Outcome,
    ) -> Result<u64, CacheError> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let entry = AuditEntry::new(seq, action, src, dst, outcome);
        let mut line = serde_json::to_string(&entry).map_err(|e| CacheError::Storage(e.to_string()))?;
        line.push('\n');

        let mut file = self.file.lock().expect("audit log writer poisoned");
        file.write_all(line.as_bytes())
            .map_err(|e| CacheError::Io(e.to_string()))?;
        file.sync_all().map_err(|e| CacheError::Io(e.to_string()))?;

        let written = self.bytes_written.fetch_add(line.len() as u64, Ordering::SeqCst) + line.len() as u64;
        if written >= self.max_bytes {
            self.rotate(&mut file)?;
        }

        Ok(seq)
    }

    fn rotate(&self, file: &mut File) -> Result<(), CacheError> {
        let active = active_path(&self.dir);
        let rotated = self.dir.join(format!(
            "audit-{}.log",
            chrono::Utc::now().format("%Y%m%d%H%M%S%f")
        ));
        std::fs::rename(&active, &rotated).map_err(|e| CacheError::Io(e.to_string()))?;

        *file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&active)
            .map_err(|e| CacheError::Io(e.to_string()))?;
        self.bytes_written.store(0, Ordering::SeqCst);

        self.prune_old_rotations()?;
        Ok(())
    }

    fn prune_old_rotations(&self) -> Result<(), CacheError> {
        let mut rotated: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .map_err(|e| CacheError::Io(e.to_string()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("audit-") && n.ends_with(".log") && n != "audit-active.log")
                    .unwrap_or(false)
            })
            .collect();
        rotated.sort();

        while rotated.len() > self.retain {
            let oldest = rotated.remove(0);
            let _ = std::fs::remove_file(oldest);
        }
        Ok(())
    }
}

fn active_path(dir: &Path) -> PathBuf {
    dir.join("audit-active.log")
}

fn last_seq(path: &Path) -> Option<u64> {
    let content = std::fs::read_to_string(path).ok()?;
    let last_line = content.lines().last()?;
    let entry: AuditEntry = serde_json::from_str(last_line).ok()?;
    Some(entry.seq)
}
