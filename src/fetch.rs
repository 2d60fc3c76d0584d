//! Source artifact fetching with a digest-keyed local cache.
//!
//! A package's sources live next to its build script, named by the final
//! path segment of their download URL. A file is a cache hit when it exists
//! and its MD5 equals the descriptor's expected checksum; there is no other
//! cache metadata. On a miss the URL is fetched over HTTP and the body is
//! hashed while it streams to disk, so the caller gets the computed digest
//! without a second pass over the file.
//!
//! The fetcher never decides pass/fail on a digest mismatch: it reports the
//! computed digest and leaves the positional comparison against the
//! descriptor to the pipeline, which aggregates all of a package's sources
//! into a single verdict.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use md5::{Digest, Md5};
use thiserror::Error;

use crate::checksum::{digests_match, md5_file};

/// Errors from resolving or downloading a source URL.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL scheme or shape the fetcher does not handle. Detected before any
    /// network I/O.
    #[error("unsupported download URL: {0}")]
    Unsupported(String),

    /// Transport failure: connection error, mid-stream error, or a
    /// non-success HTTP status.
    #[error("download of {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// Local filesystem failure while writing the cache file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Derive the local cache filename for a URL: its final path segment.
///
/// The URL must actually have a path; a bare `scheme://host` has no usable
/// segment (the host is not a filename) and is rejected.
pub fn source_file_name(url: &str) -> Result<&str, FetchError> {
    let unsupported = || FetchError::Unsupported(url.to_string());
    let after_authority = url
        .split_once("://")
        .and_then(|(_, rest)| rest.split_once('/'))
        .map(|(_, path)| path)
        .ok_or_else(unsupported)?;
    match after_authority.rsplit('/').next() {
        Some(name) if !name.is_empty() && !name.contains(':') => Ok(name),
        _ => Err(unsupported()),
    }
}

fn is_supported_scheme(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Ensure a verified copy of `url` exists in `dir`, returning the computed
/// MD5 digest of the local file.
///
/// Cache hit (file present, digest equals `expected`) performs zero network
/// calls. Otherwise the URL is fetched and the streamed body replaces the
/// cache entry; the returned digest is whatever the download hashed to, and
/// may differ from `expected`.
pub fn ensure_source(dir: &Path, url: &str, expected: &str) -> Result<String, FetchError> {
    if !is_supported_scheme(url) {
        return Err(FetchError::Unsupported(url.to_string()));
    }
    let file_name = source_file_name(url)?;
    let dest = dir.join(file_name);

    if dest.is_file() {
        let digest = md5_file(&dest)?;
        if digests_match(&digest, expected) {
            return Ok(digest);
        }
    }

    download(url, &dest)
}

/// Fetch `url` into `dest`, hashing the body as it streams.
fn download(url: &str, dest: &Path) -> Result<String, FetchError> {
    let transport = |reason: String| FetchError::Transport {
        url: url.to_string(),
        reason,
    };

    let mut response = reqwest::blocking::get(url).map_err(|e| transport(e.to_string()))?;
    if !response.status().is_success() {
        return Err(transport(format!("HTTP status {}", response.status())));
    }

    let mut file = File::create(dest)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = response
            .read(&mut buf)
            .map_err(|e| transport(e.to_string()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        file.write_all(&buf[..n])?;
    }
    file.flush()?;

    Ok(hex::encode(hasher.finalize()))
}
