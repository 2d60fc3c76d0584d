//! Package descriptor (`<name>.info`) parsing.
//!
//! The descriptor is a small `KEY="value"` file next to the build script:
//!
//! ```text
//! PKGNAM="foo"
//! VERSION="1.0"
//! HOMEPAGE="https://example.com/foo"
//! DOWNLOAD="https://example.com/foo-1.0.tar.gz \
//!           https://example.com/foo-data.tar.gz"
//! MD5SUM="aaaa... \
//!         bbbb..."
//! ```
//!
//! Values are double-quoted; a trailing backslash continues the value on the
//! next line. `DOWNLOAD` and `MD5SUM` are whitespace-separated lists that
//! must pair positionally, which is enforced here so the pipeline can index
//! them together without further checks.

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

/// Parsed package descriptor. Immutable; re-parsed fresh for every step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    /// Package name (`PKGNAM`)
    pub name: String,

    /// Version string (`VERSION`)
    pub version: String,

    /// Upstream homepage (`HOMEPAGE`), empty if absent
    pub homepage: String,

    /// Download URLs, in declared order
    pub downloads: Vec<String>,

    /// Expected MD5 checksums, positionally paired with `downloads`
    pub checksums: Vec<String>,
}

/// Errors from reading or parsing a descriptor file.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{path}:{line}: expected KEY=\"value\"")]
    Malformed { path: String, line: usize },

    #[error("{path}: missing required field {field}")]
    MissingField { path: String, field: &'static str },

    #[error("{path}: {downloads} download URLs but {checksums} checksums")]
    ListMismatch {
        path: String,
        downloads: usize,
        checksums: usize,
    },
}

impl PackageDescriptor {
    /// Read and parse `<package_dir>/<name>.info`.
    pub fn resolve(package_dir: &Path, name: &str) -> Result<Self, DescriptorError> {
        Self::parse_file(&package_dir.join(format!("{name}.info")))
    }

    /// Read and parse a descriptor file.
    pub fn parse_file(path: &Path) -> Result<Self, DescriptorError> {
        let label = path.display().to_string();
        let contents = fs::read_to_string(path).map_err(|source| DescriptorError::Io {
            path: label.clone(),
            source,
        })?;
        Self::parse(&label, &contents)
    }

    /// Parse descriptor contents; `path` is used for diagnostics only.
    pub fn parse(path: &str, contents: &str) -> Result<Self, DescriptorError> {
        let mut name = None;
        let mut version = None;
        let mut homepage = None;
        let mut downloads = None;
        let mut checksums = None;

        for (line_no, line) in logical_lines(contents) {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let (key, value) = parse_assignment(trimmed).ok_or(DescriptorError::Malformed {
                path: path.to_string(),
                line: line_no,
            })?;

            match key {
                "PKGNAM" => name = Some(value),
                "VERSION" => version = Some(value),
                "HOMEPAGE" => homepage = Some(value),
                "DOWNLOAD" => downloads = Some(split_list(&value)),
                "MD5SUM" => checksums = Some(split_list(&value)),
                // Unknown keys (maintainer fields etc.) are ignored
                _ => {}
            }
        }

        let missing = |field| DescriptorError::MissingField {
            path: path.to_string(),
            field,
        };
        let name = name.ok_or_else(|| missing("PKGNAM"))?;
        let version = version.ok_or_else(|| missing("VERSION"))?;
        let downloads = downloads.ok_or_else(|| missing("DOWNLOAD"))?;
        let checksums = checksums.ok_or_else(|| missing("MD5SUM"))?;

        if downloads.len() != checksums.len() {
            return Err(DescriptorError::ListMismatch {
                path: path.to_string(),
                downloads: downloads.len(),
                checksums: checksums.len(),
            });
        }

        Ok(Self {
            name,
            version,
            homepage: homepage.unwrap_or_default(),
            downloads,
            checksums,
        })
    }
}

/// Join backslash-continued physical lines into logical lines, keeping the
/// line number of each logical line's first physical line.
fn logical_lines(contents: &str) -> Vec<(usize, String)> {
    let mut out: Vec<(usize, String)> = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, raw) in contents.lines().enumerate() {
        let line_no = idx + 1;
        let (continued, text) = match raw.trim_end().strip_suffix('\\') {
            Some(stripped) => (true, stripped),
            None => (false, raw),
        };

        match pending.take() {
            Some((start, mut acc)) => {
                acc.push(' ');
                acc.push_str(text.trim());
                if continued {
                    pending = Some((start, acc));
                } else {
                    out.push((start, acc));
                }
            }
            None => {
                if continued {
                    pending = Some((line_no, text.to_string()));
                } else {
                    out.push((line_no, raw.to_string()));
                }
            }
        }
    }

    if let Some(last) = pending {
        out.push(last);
    }
    out
}

/// Parse one `KEY="value"` assignment.
fn parse_assignment(line: &str) -> Option<(&str, String)> {
    let (key, rest) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    let rest = rest.trim();
    let value = rest.strip_prefix('"')?.strip_suffix('"')?;
    Some((key, value.to_string()))
}

fn split_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const BASIC: &str = r#"PKGNAM="foo"
VERSION="1.0"
HOMEPAGE="https://example.com/foo"
DOWNLOAD="https://example.com/foo-1.0.tar.gz"
MD5SUM="d41d8cd98f00b204e9800998ecf8427e"
"#;

    #[test]
    fn test_parse_basic() {
        let d = PackageDescriptor::parse("foo.info", BASIC).unwrap();
        assert_eq!(d.name, "foo");
        assert_eq!(d.version, "1.0");
        assert_eq!(d.homepage, "https://example.com/foo");
        assert_eq!(d.downloads, vec!["https://example.com/foo-1.0.tar.gz"]);
        assert_eq!(d.checksums, vec!["d41d8cd98f00b204e9800998ecf8427e"]);
    }

    #[test]
    fn test_parse_multi_source_with_continuations() {
        let text = r#"PKGNAM="bar"
VERSION="2.1"
DOWNLOAD="https://example.com/bar-2.1.tar.gz \
          https://example.com/bar-data.tar.gz"
MD5SUM="aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa \
        bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"
"#;
        let d = PackageDescriptor::parse("bar.info", text).unwrap();
        assert_eq!(d.downloads.len(), 2);
        assert_eq!(d.checksums.len(), 2);
        assert_eq!(d.downloads[1], "https://example.com/bar-data.tar.gz");
        assert_eq!(d.checksums[1], "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
    }

    #[test]
    fn test_list_length_mismatch_is_parse_error() {
        let text = r#"PKGNAM="foo"
VERSION="1.0"
DOWNLOAD="https://example.com/a.tar.gz https://example.com/b.tar.gz"
MD5SUM="aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
"#;
        let err = PackageDescriptor::parse("foo.info", text).unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::ListMismatch {
                downloads: 2,
                checksums: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_required_field() {
        let text = "PKGNAM=\"foo\"\nDOWNLOAD=\"x\"\nMD5SUM=\"y\"\n";
        let err = PackageDescriptor::parse("foo.info", text).unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::MissingField {
                field: "VERSION",
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let text = "PKGNAM=\"foo\"\nVERSION=1.0\n";
        let err = PackageDescriptor::parse("foo.info", text).unwrap_err();
        match err {
            DescriptorError::Malformed { line, .. } => assert_eq!(line, 2),
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_comments_and_unknown_keys_ignored() {
        let text = format!("# maintainer notes\nMAINTAINER=\"someone\"\n{BASIC}");
        let d = PackageDescriptor::parse("foo.info", &text).unwrap();
        assert_eq!(d.name, "foo");
    }

    #[test]
    fn test_resolve_reads_info_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("foo.info"), BASIC).unwrap();
        let d = PackageDescriptor::resolve(dir.path(), "foo").unwrap();
        assert_eq!(d.version, "1.0");
    }

    #[test]
    fn test_resolve_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = PackageDescriptor::resolve(dir.path(), "nope").unwrap_err();
        assert!(matches!(err, DescriptorError::Io { .. }));
    }
}
