//! Candidate file identity and content-hash types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Stable inode/file-id when the OS provides one.
///
/// Used only to skip re-reading a physical file reached by two paths
/// (hardlinks); never used to declare two files duplicates of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InodeInfo {
    /// Inode number.
    pub inode: u64,
    /// Device ID.
    pub device: u64,
}

impl InodeInfo {
    /// Create new inode info.
    pub fn new(inode: u64, device: u64) -> Self {
        Self { inode, device }
    }
}

/// Identity of a candidate file during a scan.
///
/// Created by the Scanner; handed to the Hasher via a bounded queue and
/// owned by the Group Manager for the remaining lifetime of the scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Absolute, canonicalized path.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Modification time, seconds since epoch.
    pub mtime_secs: i64,
    /// Modification time, sub-second nanoseconds (best effort).
    pub mtime_nanos: u32,
    /// Inode/device pair, when the OS provides one.
    pub inode: Option<InodeInfo>,
}

impl FileDescriptor {
    /// Create a new file descriptor.
    pub fn new(path: PathBuf, size: u64, mtime_secs: i64, mtime_nanos: u32) -> Self {
        Self {
            path,
            size,
            mtime_secs,
            mtime_nanos,
            inode: None,
        }
    }

    /// The (path, size, mtime) witness used to index the hash cache.
    pub fn hash_key(&self) -> HashKey {
        HashKey {
            path: self.path.clone(),
            size: self.size,
            mtime_secs: self.mtime_secs,
            mtime_nanos: self.mtime_nanos,
        }
    }

    /// Re-stat the file and report whether size/mtime still match this
    /// descriptor. Any mismatch means the cache entry keyed on the old
    /// witness is stale.
    pub fn still_matches(&self, current: &FileDescriptor) -> bool {
        self.size == current.size
            && self.mtime_secs == current.mtime_secs
            && self.mtime_nanos == current.mtime_nanos
    }
}

/// Tuple (path, size, mtime) used as the cache index.
///
/// A cache entry is valid only while the file at `path` still reports the
/// same size and mtime; any mismatch invalidates the entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashKey {
    pub path: PathBuf,
    pub size: u64,
    pub mtime_secs: i64,
    pub mtime_nanos: u32,
}

/// Full-content digest algorithm. Quick-hash is always the fixed
/// prefix+suffix+size scheme and is not selectable here; only the
/// full-hash algorithm is a configuration knob, because changing it
/// invalidates every full-hash cache entry (never per-file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-256, the default.
    Sha256,
    /// BLAKE3, offered as a faster alternative.
    Blake3,
}

impl HashAlgorithm {
    /// Stable name stored in the cache's `meta` table.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }

    /// Parse the name stored in the cache's `meta` table.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sha256" => Some(Self::Sha256),
            "blake3" => Some(Self::Blake3),
            _ => None,
        }
    }
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Sha256
    }
}

/// A full-content digest. Always 32 bytes regardless of algorithm (both
/// SHA-256 and BLAKE3 produce 32-byte digests).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FullHash(pub [u8; 32]);

impl FullHash {
    /// Render as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Up to three hash values for a file.
///
/// The full hash may be absent while only the quick-hash phase has run.
/// Two files share a full-hash value iff they are byte-identical (modulo
/// the negligible collision probability of the chosen digest).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FileHashes {
    pub size: u64,
    pub quick: Option<u64>,
    pub full: Option<FullHash>,
}

impl FileHashes {
    /// Hashes with only a quick-hash populated.
    pub fn quick_only(size: u64, quick: u64) -> Self {
        Self {
            size,
            quick: Some(quick),
            full: None,
        }
    }

    /// Hashes with both quick- and full-hash populated.
    pub fn complete(size: u64, quick: u64, full: FullHash) -> Self {
        Self {
            size,
            quick: Some(quick),
            full: Some(full),
        }
    }
}
