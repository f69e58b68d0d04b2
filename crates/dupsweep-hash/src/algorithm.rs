//! Quick-hash and full-hash computation.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use dupsweep_core::{FullHash, HashAlgorithm, IoError};
use twox_hash::XxHash64;
use std::hash::Hasher as _;

/// Above this size, use an mmap instead of buffered reads for full-hash.
const MMAP_THRESHOLD: u64 = 128 * 1024;

/// Small-file buffered read chunk size.
const SMALL_BUFFER: usize = 64 * 1024;

/// Large-file buffered read chunk size (adaptive buffering).
const LARGE_BUFFER: usize = 4 * 1024 * 1024;
const LARGE_BUFFER_THRESHOLD: u64 = 256 * 1024 * 1024;

fn adaptive_buffer_size(file_size: u64) -> usize {
    if file_size >= LARGE_BUFFER_THRESHOLD {
        LARGE_BUFFER
    } else {
        SMALL_BUFFER
    }
}

/// Compute the 64-bit quick-hash: head sample, tail sample (if the file is
/// larger than `2 * sample_size`), and the size tag, folded through
/// `XxHash64`. The sample-position tie-break is fixed: head first, then
/// tail, then the little-endian size — implementations that deviate must
/// bump the cache schema version.
pub fn quick_hash(path: &Path, sample_size: usize) -> Result<u64, IoError> {
    let mut file = File::open(path).map_err(|e| IoError::from_io(path, &e))?;
    let file_size = file
        .metadata()
        .map_err(|e| IoError::from_io(path, &e))?
        .len();

    let mut hasher = XxHash64::with_seed(0);

    let head_size = (sample_size as u64).min(file_size) as usize;
    let mut head_buf = vec![0u8; head_size];
    file.read_exact(&mut head_buf)
        .map_err(|e| IoError::from_io(path, &e))?;
    hasher.write(&head_buf);

    if file_size > 2 * sample_size as u64 {
        let tail_size = sample_size as u64;
        file.seek(SeekFrom::End(-(tail_size as i64)))
            .map_err(|e| IoError::from_io(path, &e))?;
        let mut tail_buf = vec![0u8; tail_size as usize];
        file.read_exact(&mut tail_buf)
            .map_err(|e| IoError::from_io(path, &e))?;
        hasher.write(&tail_buf);
    }

    hasher.write(&file_size.to_le_bytes());
    Ok(hasher.finish())
}

/// Compute the full-content digest, streamed in adaptively sized chunks
/// (or memory-mapped above [`MMAP_THRESHOLD`]).
pub fn full_hash(path: &Path, algorithm: HashAlgorithm) -> Result<FullHash, IoError> {
    let file = File::open(path).map_err(|e| IoError::from_io(path, &e))?;
    let file_size = file
        .metadata()
        .map_err(|e| IoError::from_io(path, &e))?
        .len();

    if file_size > MMAP_THRESHOLD {
        // SAFETY: the file is not concurrently truncated by this process;
        // a vanishing/truncated file produces a read error the caller
        // treats as a skip.
        let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| IoError::from_io(path, &e))?;
        return Ok(digest_bytes(&mmap, algorithm));
    }

    digest_stream(file, file_size, algorithm, path)
}

fn digest_bytes(bytes: &[u8], algorithm: HashAlgorithm) -> FullHash {
    match algorithm {
        HashAlgorithm::Blake3 => FullHash(*blake3::hash(bytes).as_bytes()),
        HashAlgorithm::Sha256 => {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            FullHash(hasher.finalize().into())
        }
    }
}

fn digest_stream(
    mut file: File,
    file_size: u64,
    algorithm: HashAlgorithm,
    path: &Path,
) -> Result<FullHash, IoError> {
    let mut buffer = vec![0u8; adaptive_buffer_size(file_size)];

    match algorithm {
        HashAlgorithm::Blake3 => {
            let mut hasher = blake3::Hasher::new();
            loop {
                let n = file.read(&mut buffer).map_err(|e| IoError::from_io(path, &e))?;
                if n == 0 {
                    break;
                }
                hasher.update(&buffer[..n]);
            }
            Ok(FullHash(*hasher.finalize().as_bytes()))
        }
        HashAlgorithm::Sha256 => {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            loop {
                let n = file.read(&mut buffer).map_err(|e| IoError::from_io(path, &e))?;
                if n == 0 {
                    break;
                }
                hasher.update(&buffer[..n]);
            }
            Ok(FullHash(hasher.finalize().into()))
        }
    }
}
