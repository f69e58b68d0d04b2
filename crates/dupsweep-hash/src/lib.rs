//! Tiered hashing pipeline and persistent hash cache for dupsweep.
//!
//! Pass 2 (quick-hash) and Pass 3 (full-hash) of the scan pipeline live
//! here, along with the on-disk cache that lets a repeat scan skip
//! re-reading files whose size and mtime haven't changed.

mod algorithm;
mod cache;
mod pool;

pub use algorithm::{full_hash, quick_hash};
pub use cache::HashCache;
pub use pool::HashPool;
