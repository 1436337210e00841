//! Integrity: SHA-256 content identifiers for received files.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

const READ_BUFFER: usize = 16 * 1024;

/// Hash a byte slice. Returns 32-byte digest.
pub fn hash_bytes(payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hasher.finalize().into()
}

/// Hash a file's content without loading it whole.
pub fn hash_file(path: &Path) -> io::Result<[u8; 32]> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; READ_BUFFER];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

/// Verify a file's content against an expected identifier.
pub fn verify_file(path: &Path, expected: &[u8; 32]) -> io::Result<bool> {
    Ok(hash_file(path)? == *expected)
}
