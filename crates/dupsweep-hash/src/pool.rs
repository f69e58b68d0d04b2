//! Bounded-concurrency hashing over a batch of descriptors: a worker
//! pool sized once and reused, default `max(2, cores-1)` threads.

use dupsweep_core::{FileDescriptor, HashAlgorithm, IoError};
use rayon::prelude::*;

use crate::algorithm::{full_hash, quick_hash};

/// A worker pool sized once at construction and reused across a scan's
/// Pass 2 and Pass 3.
pub struct HashPool {
    pool: rayon::ThreadPool,
}

impl HashPool {
    /// Build a pool with `worker_count` threads.
    pub fn new(worker_count: usize) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count.max(1))
            .thread_name(|i| format!("dupsweep-hash-{i}"))
            .build()
            .expect("failed to build hash worker pool");
        Self { pool }
    }

    /// Quick-hash every descriptor, in parallel, bounded by this pool's
    /// thread count. Order of the returned vector matches `descriptors`.
    pub fn quick_hash_all(
        &self,
        descriptors: &[FileDescriptor],
        sample_size: usize,
    ) -> Vec<(FileDescriptor, Result<u64, IoError>)> {
        self.pool.install(|| {
            descriptors
                .par_iter()
                .map(|d| (d.clone(), quick_hash(&d.path, sample_size)))
                .collect()
        })
    }

    /// Full-hash every descriptor, in parallel, bounded by this pool's
    /// thread count.
    pub fn full_hash_all(
        &self,
        descriptors: &[FileDescriptor],
        algorithm: HashAlgorithm,
    ) -> Vec<(FileDescriptor, Result<dupsweep_core::FullHash, IoError>)> {
        self.pool.install(|| {
            descriptors
                .par_iter()
                .map(|d| (d.clone(), full_hash(&d.path, algorithm)))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn quick_hash_all_preserves_order_and_groups_duplicates() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), b"same content").unwrap();
        fs::write(temp.path().join("b"), b"same content").unwrap();
        fs::write(temp.path().join("c"), b"different content here").unwrap();

        let descriptors: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|name| {
                let path = temp.path().join(name);
                let meta = fs::metadata(&path).unwrap();
                FileDescriptor::new(path, meta.len(), 0, 0)
            })
            .collect();

        let pool = HashPool::new(2);
        let results = pool.quick_hash_all(&descriptors, 4096);
        assert_eq!(results.len(), 3);

        let ha = results[0].1.as_ref().unwrap();
        let hb = results[1].1.as_ref().unwrap();
        let hc = results[2].1.as_ref().unwrap();
        assert_eq!(ha, hb);
        assert_ne!(ha, hc);
    }

    #[test]
    fn full_hash_all_reports_io_error_for_missing_file() {
        let temp = TempDir::new().unwrap();
        let descriptors = vec![FileDescriptor::new(temp.path().join("missing"), 0, 0, 0)];

        let pool = HashPool::new(1);
        let results = pool.full_hash_all(&descriptors, HashAlgorithm::Sha256);
        assert!(results[0].1.is_err());
    }
}
