//! Persistent hash cache.
//!
//! Backed by a single SQLite file in WAL mode, mirroring the recovery and
//! pragma-tuning idiom of a rebuildable on-disk scan cache: corruption or a
//! schema mismatch triggers a one-shot rebuild rather than a hard failure.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use dupsweep_core::{CacheError, FullHash, HashAlgorithm, HashKey};
use rusqlite::{params, Connection, OptionalExtension};

const SCHEMA_VERSION: i64 = 1;
const DB_BUSY_TIMEOUT_SECS: u64 = 30;

/// Entries unused for this many days are evicted by [`HashCache::prune`].
const MAX_AGE_DAYS: i64 = 90;

/// Hard cap on the number of rows kept; the oldest-by-`last_access` rows
/// beyond this count are evicted first.
const MAX_ENTRIES: i64 = 100_000;

/// Number of pooled read-only connections used for concurrent `get()`
/// calls, separate from the single writer connection so that a prune
/// never blocks a lookup: a concurrent prune must not block a get.
const READ_POOL_SIZE: usize = 4;

/// Convert a `rusqlite::Error` into the crate-local `CacheError`. A plain
/// `From` impl would violate the orphan rule (neither type is local to this
/// crate), so the conversion is a free function applied with `map_err`.
fn rc(err: rusqlite::Error) -> CacheError {
    CacheError::Storage(err.to_string())
}

/// The persistent hash cache: (path, size, mtime) -> (quick hash, full
/// hash, algorithm).
pub struct HashCache {
    write_conn: Mutex<Connection>,
    read_pool: Vec<Mutex<Connection>>,
    next_reader: AtomicUsize,
    path: PathBuf,
}

impl HashCache {
    /// Open (creating if absent) the cache database at `path`. On
    /// corruption or an unreadable schema, the database is moved aside and
    /// recreated empty rather than surfacing a hard error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Io(e.to_string()))?;
        }

        match Self::try_open(&path) {
            Ok(cache) => Ok(cache),
            Err(_) => Self::recover(&path),
        }
    }

    fn try_open(path: &Path) -> Result<Self, CacheError> {
        let write_conn = Self::open_connection(path)?;
        init_schema(&write_conn)?;

        let mut read_pool = Vec::with_capacity(READ_POOL_SIZE);
        for _ in 0..READ_POOL_SIZE {
            read_pool.push(Mutex::new(Self::open_connection(path)?));
        }

        Ok(Self {
            write_conn: Mutex::new(write_conn),
            read_pool,
            next_reader: AtomicUsize::new(0),
            path: path.to_path_buf(),
        })
    }

    fn open_connection(path: &Path) -> Result<Connection, CacheError> {
        let conn = Connection::open(path).map_err(rc)?;
        conn.pragma_update(None, "journal_mode", "WAL").map_err(rc)?;
        conn.busy_timeout(Duration::from_secs(DB_BUSY_TIMEOUT_SECS)).map_err(rc)?;
        conn.pragma_update(None, "synchronous", "NORMAL").map_err(rc)?;
        conn.pragma_update(None, "temp_store", "MEMORY").map_err(rc)?;
        conn.pragma_update(None, "cache_size", -16384).map_err(rc)?;
        Ok(conn)
    }

    /// One-shot rebuild: rename the existing file aside (best effort) and
    /// recreate an empty cache in its place. Used when the database file
    /// is corrupt or carries a schema version this build doesn't know how
    /// to read: a schema version mismatch triggers a rebuild.
    fn recover(path: &Path) -> Result<Self, CacheError> {
        tracing::warn!(?path, "hash cache unreadable, rebuilding");
        if path.exists() {
            let backup = path.with_extension("db.backup");
            let _ = std::fs::rename(path, &backup);
            let _ = std::fs::remove_file(path.with_extension("db-wal"));
            let _ = std::fs::remove_file(path.with_extension("db-shm"));
        }
        Self::try_open(path).map_err(|e| CacheError::RebuildFailed(e.to_string()))
    }

    /// Path to the database file backing this cache.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reader(&self) -> &Mutex<Connection> {
        let idx = self.next_reader.fetch_add(1, Ordering::Relaxed) % self.read_pool.len();
        &self.read_pool[idx]
    }

    /// Look up a cached entry for the given (path, size, mtime) witness.
    /// Returns `None` on a cache miss; the caller recomputes the hash.
    pub fn get(&self, key: &HashKey) -> Result<Option<(Option<u64>, Option<FullHash>)>, CacheError> {
        let conn = self.reader().lock().expect("read connection poisoned");
        let path_str = key.path.to_string_lossy();

        let row: Option<(Option<i64>, Option<Vec<u8>>)> = conn
            .query_row(
                "SELECT quick, full FROM entries \
                 WHERE path = ?1 AND size = ?2 AND mtime_secs = ?3 AND mtime_nanos = ?4",
                params![path_str, key.size as i64, key.mtime_secs, key.mtime_nanos],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(rc)?;

        let Some((quick, full)) = row else {
            return Ok(None);
        };

        conn.execute(
            "UPDATE entries SET last_access = strftime('%s','now') \
             WHERE path = ?1 AND size = ?2 AND mtime_secs = ?3 AND mtime_nanos = ?4",
            params![path_str, key.size as i64, key.mtime_secs, key.mtime_nanos],
        )
        .map_err(rc)?;

        let quick = quick.map(|v| v as u64);
        let full = full.map(|bytes| {
            let mut arr = [0u8; 32];
            arr.copy_from_slice(&bytes[..32]);
            FullHash(arr)
        });
        Ok(Some((quick, full)))
    }

    /// Insert or replace the cached entry for `key`.
    pub fn put(
        &self,
        key: &HashKey,
        quick: Option<u64>,
        full: Option<FullHash>,
    ) -> Result<(), CacheError> {
        let conn = self.write_conn.lock().expect("write connection poisoned");
        conn.execute(
            "INSERT INTO entries (path, size, mtime_secs, mtime_nanos, quick, full, last_access, created) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, strftime('%s','now'), strftime('%s','now')) \
             ON CONFLICT(path) DO UPDATE SET \
                size = excluded.size, mtime_secs = excluded.mtime_secs, \
                mtime_nanos = excluded.mtime_nanos, quick = excluded.quick, \
                full = excluded.full, last_access = excluded.last_access",
            params![
                key.path.to_string_lossy(),
                key.size as i64,
                key.mtime_secs,
                key.mtime_nanos,
                quick.map(|v| v as i64),
                full.map(|h| h.0.to_vec()),
            ],
        )
        .map_err(rc)?;
        Ok(())
    }

    /// Record which full-hash algorithm populated the cache. A mismatch
    /// against the current `ScanOptions::hash_algorithm` means every
    /// `full` column is stale and the cache must be rebuilt.
    pub fn recorded_algorithm(&self) -> Result<Option<HashAlgorithm>, CacheError> {
        let conn = self.write_conn.lock().expect("write connection poisoned");
        let name: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'hash_algorithm'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(rc)?;
        Ok(name.and_then(|n| HashAlgorithm::from_name(&n)))
    }

    pub fn record_algorithm(&self, algorithm: HashAlgorithm) -> Result<(), CacheError> {
        let conn = self.write_conn.lock().expect("write connection poisoned");
        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('hash_algorithm', ?1) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![algorithm.name()],
        )
        .map_err(rc)?;
        Ok(())
    }

    /// Clear every cached `full` digest, leaving `quick` untouched.
    ///
    /// A full-hash digest is only meaningful under the algorithm that
    /// produced it; a digest computed with the previous algorithm is not
    /// comparable to one computed with the new one, so every `full` column
    /// must be wiped rather than merely re-labeled when the algorithm
    /// changes.
    pub fn clear_full_hashes(&self) -> Result<u64, CacheError> {
        let conn = self.write_conn.lock().expect("write connection poisoned");
        let cleared = conn
            .execute(
                "UPDATE entries SET full = NULL WHERE full IS NOT NULL",
                [],
            )
            .map_err(rc)? as u64;
        Ok(cleared)
    }

    /// Evict entries older than [`MAX_AGE_DAYS`] and, beyond that, the
    /// oldest-by-`last_access` rows past [`MAX_ENTRIES`]. Takes the write
    /// lock only for the duration of the delete statements; concurrent
    /// `get()` calls proceed against the read pool without blocking
    /// (SQLite's WAL mode lets readers run alongside a writer).
    pub fn prune(&self) -> Result<u64, CacheError> {
        let conn = self.write_conn.lock().expect("write connection poisoned");
        let cutoff_secs = MAX_AGE_DAYS * 24 * 60 * 60;

        let mut evicted = conn
            .execute(
                "DELETE FROM entries WHERE last_access < strftime('%s','now') - ?1",
                params![cutoff_secs],
            )
            .map_err(rc)? as u64;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
            .map_err(rc)?;
        if count > MAX_ENTRIES {
            let overflow = count - MAX_ENTRIES;
            evicted += conn
                .execute(
                    "DELETE FROM entries WHERE path IN ( \
                        SELECT path FROM entries ORDER BY last_access ASC LIMIT ?1 \
                     )",
                    params![overflow],
                )
                .map_err(rc)? as u64;
        }

        if evicted > 0 {
            tracing::debug!(evicted, "pruned hash cache entries");
        }
        Ok(evicted)
    }

    /// Total number of cached entries.
    pub fn len(&self) -> Result<u64, CacheError> {
        let conn = self.write_conn.lock().expect("write connection poisoned");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
            .map_err(rc)?;
        Ok(count as u64)
    }
}

fn init_schema(conn: &Connection) -> Result<(), CacheError> {
    let version: Option<i64> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()
        .map_err(rc)?;

    match version {
        None => {
            conn.execute(
                "CREATE TABLE schema_version (version INTEGER NOT NULL)",
                [],
            )
            .map_err(rc)?;
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )
            .map_err(rc)?;
            create_tables(conn)?;
        }
        Some(v) if v == SCHEMA_VERSION => {
            create_tables(conn)?;
        }
        Some(found) => {
            return Err(CacheError::SchemaMismatch {
                found,
                expected: SCHEMA_VERSION,
            });
        }
    }
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<(), CacheError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS entries (
            path TEXT PRIMARY KEY,
            size INTEGER NOT NULL,
            mtime_secs INTEGER NOT NULL,
            mtime_nanos INTEGER NOT NULL,
            quick INTEGER,
            full BLOB,
            last_access INTEGER NOT NULL,
            created INTEGER NOT NULL
        )",
        [],
    )
    .map_err(rc)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_last_access ON entries(last_access)",
        [],
    )
    .map_err(rc)?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        [],
    )
    .map_err(rc)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn key(path: &str) -> HashKey {
        HashKey {
            path: PathBuf::from(path),
            size: 10,
            mtime_secs: 100,
            mtime_nanos: 0,
        }
    }

    #[test]
    fn miss_then_put_then_hit() {
        let temp = TempDir::new().unwrap();
        let cache = HashCache::open(temp.path().join("cache.db")).unwrap();

        let k = key("/tmp/a");
        assert!(cache.get(&k).unwrap().is_none());

        cache.put(&k, Some(42), Some(FullHash([1u8; 32]))).unwrap();
        let (quick, full) = cache.get(&k).unwrap().unwrap();
        assert_eq!(quick, Some(42));
        assert_eq!(full, Some(FullHash([1u8; 32])));
    }

    #[test]
    fn changed_mtime_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let cache = HashCache::open(temp.path().join("cache.db")).unwrap();

        let k = key("/tmp/a");
        cache.put(&k, Some(42), None).unwrap();

        let mut moved = k.clone();
        moved.mtime_secs += 1;
        assert!(cache.get(&moved).unwrap().is_none());
    }

    #[test]
    fn recovers_from_corrupted_database_file() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("cache.db");
        std::fs::write(&db_path, b"not a sqlite file at all").unwrap();

        let cache = HashCache::open(&db_path).unwrap();
        assert_eq!(cache.len().unwrap(), 0);
        assert!(temp.path().join("cache.db.backup").exists());
    }

    #[test]
    fn prune_evicts_entries_past_the_age_cutoff() {
        let temp = TempDir::new().unwrap();
        let cache = HashCache::open(temp.path().join("cache.db")).unwrap();

        let k = key("/tmp/a");
        cache.put(&k, Some(1), None).unwrap();
        {
            let conn = cache.write_conn.lock().unwrap();
            conn.execute(
                "UPDATE entries SET last_access = strftime('%s','now') - 999999999",
                [],
            )
            .unwrap();
        }

        let evicted = cache.prune().unwrap();
        assert_eq!(evicted, 1);
        assert_eq!(cache.len().unwrap(), 0);
    }

    #[test]
    fn clear_full_hashes_wipes_full_but_keeps_quick() {
        let temp = TempDir::new().unwrap();
        let cache = HashCache::open(temp.path().join("cache.db")).unwrap();

        let k = key("/tmp/a");
        cache.put(&k, Some(42), Some(FullHash([9u8; 32]))).unwrap();

        let cleared = cache.clear_full_hashes().unwrap();
        assert_eq!(cleared, 1);

        let (quick, full) = cache.get(&k).unwrap().unwrap();
        assert_eq!(quick, Some(42));
        assert_eq!(full, None);
    }

    #[test]
    fn records_and_reads_back_algorithm() {
        let temp = TempDir::new().unwrap();
        let cache = HashCache::open(temp.path().join("cache.db")).unwrap();
        assert!(cache.recorded_algorithm().unwrap().is_none());

        cache.record_algorithm(HashAlgorithm::Blake3).unwrap();
        assert_eq!(cache.recorded_algorithm().unwrap(), Some(HashAlgorithm::Blake3));
    }
}
