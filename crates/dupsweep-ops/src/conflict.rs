//! Destination-collision resolution for move operations.

use std::path::{Path, PathBuf};

use dupsweep_core::ConflictPolicy;

/// Resolve a destination collision. Returns the path to actually write
/// to, or `None` if the file should be skipped.
pub fn resolve(
    dest: &Path,
    policy: ConflictPolicy,
    dest_matches_source_hash: impl FnOnce() -> bool,
) -> Option<PathBuf> {
    if !dest.exists() {
        return Some(dest.to_path_buf());
    }

    match policy {
        ConflictPolicy::RenameWithSuffix => Some(auto_rename_path(dest)),
        ConflictPolicy::OverwriteIfSameHash => {
            if dest_matches_source_hash() {
                Some(dest.to_path_buf())
            } else {
                None
            }
        }
        ConflictPolicy::Skip => None,
    }
}

/// Generate a non-colliding path by appending a numeric suffix:
/// "file.txt" -> "file (1).txt", "file (2).txt", ...
pub fn auto_rename_path(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new(""));
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let extension = path.extension().and_then(|e| e.to_str());

    for i in 1..10_000 {
        let candidate_name = match extension {
            Some(ext) => format!("{stem} ({i}).{ext}"),
            None => format!("{stem} ({i})"),
        };
        let candidate = parent.join(&candidate_name);
        if !candidate.exists() {
            return candidate;
        }
    }

    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let candidate_name = match extension {
        Some(ext) => format!("{stem}_{nanos}.{ext}"),
        None => format!("{stem}_{nanos}"),
    };
    parent.join(candidate_name)
}
