//! End-to-end exercises of the full scan/hash/group/action pipeline, one
//! test per documented scenario.

use std::collections::HashMap;
use std::fs;
use std::time::SystemTime;

use dupsweep_core::{
    ActionKind, ActionOptions, ActionOptionsBuilder, DuplicateGroup, FileDescriptor,
    HashAlgorithm, ScanOptions,
};
use dupsweep_group::{GroupManager, GroupStats, SelectionStrategy};
use dupsweep_hash::{HashCache, HashPool};
use dupsweep_ops::{ActionExecutor, AuditLog};
use dupsweep_scan::{CancellationToken, NullProgressSink, Scanner};
use tempfile::TempDir;

/// A faithful, test-local replay of the binary's `run_pipeline`: Pass 1
/// (scan + size-bucket) -> Pass 2 (quick-hash, re-bucket by
/// (size, quick_hash)) -> Pass 3 (full-hash, re-bucket into groups) ->
/// selection. Cache is optional; cancellation is checked between size
/// buckets in Pass 2 and between quick-hash buckets in Pass 3, matching
/// the binary's own check points.
fn run_pipeline(
    options: &ScanOptions,
    strategy: SelectionStrategy,
    cache: Option<&HashCache>,
    cancel: &CancellationToken,
) -> (Vec<DuplicateGroup>, GroupStats) {
    let worker_count = options.effective_worker_count();
    let scanner = Scanner::new(options.min_size, options.follow_symlinks, worker_count);
    let scan_result = scanner
        .scan(&options.roots, cancel, &NullProgressSink)
        .unwrap();
    let candidates = dupsweep_scan::candidate_groups(scan_result.size_groups);

    let pool = HashPool::new(worker_count);

    let mut quick_groups: HashMap<(u64, u64), Vec<FileDescriptor>> = HashMap::new();
    for (size, descriptors) in candidates {
        if cancel.is_cancelled() {
            break;
        }
        let mut to_hash = Vec::new();
        for descriptor in descriptors {
            if let Some(cache) = cache {
                if let Ok(Some((Some(quick), _))) = cache.get(&descriptor.hash_key()) {
                    quick_groups.entry((size, quick)).or_default().push(descriptor);
                    continue;
                }
            }
            to_hash.push(descriptor);
        }
        for (descriptor, result) in pool.quick_hash_all(&to_hash, options.sample_size) {
            if let Ok(quick) = result {
                if let Some(cache) = cache {
                    let _ = cache.put(&descriptor.hash_key(), Some(quick), None);
                }
                quick_groups.entry((size, quick)).or_default().push(descriptor);
            }
        }
    }
    quick_groups.retain(|_, v| v.len() > 1);

    let mut manager = GroupManager::new();
    for ((size, _quick), descriptors) in quick_groups {
        if cancel.is_cancelled() {
            break;
        }
        let mut to_hash = Vec::new();
        for descriptor in descriptors {
            if let Some(cache) = cache {
                if let Ok(Some((_, Some(full)))) = cache.get(&descriptor.hash_key()) {
                    manager.record(descriptor, size, full);
                    continue;
                }
            }
            to_hash.push(descriptor);
        }
        for (descriptor, result) in pool.full_hash_all(&to_hash, options.hash_algorithm) {
            if let Ok(full) = result {
                if let Some(cache) = cache {
                    let quick = cache
                        .get(&descriptor.hash_key())
                        .ok()
                        .flatten()
                        .and_then(|(q, _)| q);
                    let _ = cache.put(&descriptor.hash_key(), quick, Some(full));
                }
                manager.record(descriptor, size, full);
            }
        }
    }

    let (mut groups, stats) = manager.finish();
    for group in &mut groups {
        strategy.apply(group);
    }
    (groups, stats)
}

fn scan_options(roots: Vec<std::path::PathBuf>) -> ScanOptions {
    ScanOptions::builder().roots(roots).build().unwrap()
}

#[test]
fn identical_content_duplicates_form_one_group() {
    let temp = TempDir::new().unwrap();
    let a = temp.path().join("a");
    let b = temp.path().join("b");
    fs::create_dir(&a).unwrap();
    fs::create_dir(&b).unwrap();
    fs::write(a.join("x.bin"), vec![b'A'; 1024]).unwrap();
    fs::write(b.join("y.bin"), vec![b'A'; 1024]).unwrap();

    let options = scan_options(vec![a, b]);
    let (groups, stats) = run_pipeline(
        &options,
        SelectionStrategy::KeepOldest,
        None,
        &CancellationToken::new(),
    );

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
    assert_eq!(groups[0].wasted_bytes(), 1024);
    assert_eq!(stats.group_count, 1);
}

#[test]
fn same_prefix_and_suffix_but_differing_middle_byte_is_not_a_duplicate() {
    let temp = TempDir::new().unwrap();
    let mut content_a = vec![0u8; 1024 * 1024];
    content_a[..4096].fill(1);
    content_a[1024 * 1024 - 4096..].fill(2);
    let mut content_b = content_a.clone();
    content_b[512 * 1024] ^= 0xff;

    fs::write(temp.path().join("a.bin"), &content_a).unwrap();
    fs::write(temp.path().join("b.bin"), &content_b).unwrap();

    let options = scan_options(vec![temp.path().to_path_buf()]);
    let (groups, _stats) = run_pipeline(
        &options,
        SelectionStrategy::KeepOldest,
        None,
        &CancellationToken::new(),
    );

    assert!(groups.is_empty());
}

#[test]
fn mtime_change_forces_a_rehash_but_group_structure_is_unchanged() {
    let temp = TempDir::new().unwrap();
    let a = temp.path().join("a.bin");
    let b = temp.path().join("b.bin");
    fs::write(&a, b"duplicate content").unwrap();
    fs::write(&b, b"duplicate content").unwrap();

    let cache = HashCache::open(temp.path().join("cache.db")).unwrap();
    let options = scan_options(vec![temp.path().to_path_buf()]);

    let (first_groups, _) = run_pipeline(
        &options,
        SelectionStrategy::KeepOldest,
        Some(&cache),
        &CancellationToken::new(),
    );
    assert_eq!(first_groups.len(), 1);

    let key_before = FileDescriptor::new(a.clone(), 18, 0, 0).hash_key();
    let (_, full_before) = cache.get(&key_before).unwrap().unwrap();

    let new_mtime = SystemTime::now() + std::time::Duration::from_secs(120);
    let file = fs::File::options().write(true).open(&a).unwrap();
    file.set_modified(new_mtime).unwrap();

    let (second_groups, _) = run_pipeline(
        &options,
        SelectionStrategy::KeepOldest,
        Some(&cache),
        &CancellationToken::new(),
    );

    assert_eq!(second_groups.len(), 1);
    assert_eq!(second_groups[0].len(), 2);

    let new_mtime_secs = new_mtime
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    let key_after = FileDescriptor::new(a, 18, new_mtime_secs, 0).hash_key();
    let (_, full_after) = cache.get(&key_after).unwrap().unwrap();
    assert_eq!(full_before, full_after);
}

#[test]
fn cancellation_stops_the_scan_and_records_a_warning() {
    let temp = TempDir::new().unwrap();
    for i in 0..50 {
        fs::write(temp.path().join(format!("f{i}")), b"same payload").unwrap();
    }

    let cancel = CancellationToken::new();
    cancel.cancel();

    let scanner = Scanner::new(0, false, 1);
    let result = scanner
        .scan(&[temp.path().to_path_buf()], &cancel, &NullProgressSink)
        .unwrap();

    assert!(result
        .warnings
        .iter()
        .any(|w| w.kind == dupsweep_core::WarningKind::Cancelled));
}

#[test]
fn execute_rejects_a_batch_that_would_empty_a_group() {
    let temp = TempDir::new().unwrap();
    let a = temp.path().join("a");
    let b = temp.path().join("b");
    let c = temp.path().join("c");
    fs::write(&a, b"hello").unwrap();
    fs::write(&b, b"hello").unwrap();
    fs::write(&c, b"hello").unwrap();

    let descriptors = vec![
        FileDescriptor::new(a.clone(), 5, 0, 0),
        FileDescriptor::new(b.clone(), 5, 0, 0),
        FileDescriptor::new(c.clone(), 5, 0, 0),
    ];
    let mut group =
        DuplicateGroup::new(dupsweep_core::FullHash([0u8; 32]), 5, descriptors).unwrap();
    for member in &mut group.members {
        member.selected = true;
    }

    let audit = AuditLog::open(temp.path().join("audit")).unwrap();
    let executor = ActionExecutor::new(audit);
    let result = executor.execute(
        &[group],
        ActionKind::Trash,
        &ActionOptions::default(),
        None,
    );

    assert_eq!(result.unwrap_err(), dupsweep_core::ActionError::WouldEmptyGroup);
    assert!(a.exists());
    assert!(b.exists());
    assert!(c.exists());
}

#[test]
fn keep_oldest_trashes_the_two_newer_copies_and_records_the_audit_trail() {
    let temp = TempDir::new().unwrap();
    let oldest = temp.path().join("oldest.bin");
    let middle = temp.path().join("middle.bin");
    let newest = temp.path().join("newest.bin");
    fs::write(&oldest, b"payload").unwrap();
    fs::write(&middle, b"payload").unwrap();
    fs::write(&newest, b"payload").unwrap();

    let base = SystemTime::now();
    fs::File::options()
        .write(true)
        .open(&oldest)
        .unwrap()
        .set_modified(base)
        .unwrap();
    fs::File::options()
        .write(true)
        .open(&middle)
        .unwrap()
        .set_modified(base + std::time::Duration::from_secs(10))
        .unwrap();
    fs::File::options()
        .write(true)
        .open(&newest)
        .unwrap()
        .set_modified(base + std::time::Duration::from_secs(20))
        .unwrap();

    let options = scan_options(vec![temp.path().to_path_buf()]);
    let (mut groups, _) = run_pipeline(
        &options,
        SelectionStrategy::KeepOldest,
        None,
        &CancellationToken::new(),
    );
    assert_eq!(groups.len(), 1);

    let kept = groups[0]
        .members
        .iter()
        .find(|m| !m.selected)
        .unwrap()
        .descriptor
        .path
        .clone();
    assert_eq!(kept, oldest);
    assert_eq!(groups[0].selected_count(), 2);

    let audit = AuditLog::open(temp.path().join("audit")).unwrap();
    let executor = ActionExecutor::new(audit);
    let group = groups.remove(0);
    let outcome = executor
        .execute(
            &[group],
            ActionKind::Trash,
            &ActionOptionsBuilder::default().build().unwrap(),
            None,
        )
        .unwrap();

    assert_eq!(outcome.succeeded(), 2);
    assert!(oldest.exists());

    let (rescanned, rescanned_stats) = run_pipeline(
        &scan_options(vec![temp.path().to_path_buf()]),
        SelectionStrategy::KeepOldest,
        None,
        &CancellationToken::new(),
    );
    assert!(rescanned.is_empty());
    assert_eq!(rescanned_stats.total_wasted_bytes, 0);
}
