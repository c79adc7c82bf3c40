//! SHA-256 file hashing for duplicate detection
//!
//! Files are streamed in fixed-size blocks so memory use does not depend on
//! file size.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::trace;

/// Read block size (64KB)
const BLOCK_SIZE: usize = 64 * 1024;

/// Compute the hex encoded SHA-256 digest of a file's content
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let hash_error = |source| Error::HashComputation {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(hash_error)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BLOCK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(hash_error)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    let hash = format!("{:x}", hasher.finalize());
    trace!(?path, %hash, "Computed file hash");
    Ok(hash)
}
