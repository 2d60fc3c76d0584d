//! MD5 content digests for source verification.
//!
//! Descriptor files carry MD5 checksums, so the same 128-bit digest is used
//! both to validate already-downloaded files and to verify fresh downloads.
//! Hashing is streaming: callers hand over any `Read` and large tarballs are
//! never buffered whole.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::{Digest, Md5};

/// Buffer size for streaming digests.
const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the lowercase hex MD5 digest of everything `reader` yields.
pub fn md5_hex<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Md5::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Digest a file on disk.
pub fn md5_file(path: &Path) -> io::Result<String> {
    md5_hex(File::open(path)?)
}

/// Compare a computed digest against an expected one, ignoring hex case.
pub fn digests_match(computed: &str, expected: &str) -> bool {
    computed.eq_ignore_ascii_case(expected)
}
