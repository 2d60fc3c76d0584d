//! Build metadata scraped from a package's build script.
//!
//! The artifact name `name-version-arch-build` plus tag is not recorded
//! anywhere as data; it has to be recovered from the `.SlackBuild` script
//! the same way the script itself computes it:
//!
//! - `ARCH` comes from a `case` on `uname -m`. The branch whose pattern
//!   matches the host architecture wins; `$(uname -m)` in a branch value
//!   resolves to the host architecture; a plain `ARCH=value` assignment
//!   (the `noarch` convention) also counts. With no marker at all the host
//!   architecture is used as-is.
//! - `BUILD` and `TAG` come from their `${VAR:-default}` fallbacks.

use std::fs;
use std::io;
use std::path::Path;

use regex_lite::Regex;

/// Fallback build number when the script declares none.
const DEFAULT_BUILD: &str = "1";

/// Fallback tag when the script declares none.
const DEFAULT_TAG: &str = "_SBo";

/// Architecture, build number, and tag for one package build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    /// Target architecture as the script would set it (e.g. "x86_64", "noarch")
    pub arch: String,

    /// Build number (e.g. "1")
    pub build: String,

    /// Packager tag appended to the build number (e.g. "_SBo")
    pub tag: String,
}

impl BuildInfo {
    /// Read a build script and extract its metadata for `host_arch`.
    pub fn from_script(script: &Path, host_arch: &str) -> io::Result<Self> {
        let text = fs::read_to_string(script)?;
        Ok(Self::from_script_text(&text, host_arch))
    }

    /// Extract metadata from script text. Missing markers fall back to
    /// `host_arch`, build "1", and tag "_SBo".
    pub fn from_script_text(text: &str, host_arch: &str) -> Self {
        Self {
            arch: extract_arch(text, host_arch),
            build: extract_fallback(text, "BUILD").unwrap_or_else(|| DEFAULT_BUILD.to_string()),
            tag: extract_fallback(text, "TAG").unwrap_or_else(|| DEFAULT_TAG.to_string()),
        }
    }

    /// Compute the full artifact name: `name-version-arch-buildTAG`.
    pub fn full_artifact_name(&self, name: &str, version: &str) -> String {
        format!(
            "{}-{}-{}-{}{}",
            name, version, self.arch, self.build, self.tag
        )
    }
}

/// Pull the default out of a `VAR=${VAR:-default}` assignment.
fn extract_fallback(text: &str, var: &str) -> Option<String> {
    let pattern = format!(r"{var}=\$\{{{var}:-([^}}\s]+)\}}");
    let re = Regex::new(&pattern).ok()?;
    re.captures(text).map(|c| c[1].to_string())
}

fn extract_arch(text: &str, host_arch: &str) -> String {
    // case branch: `  i?86) ARCH=i586 ;;` or `  *) ARCH=$(uname -m) ;;`
    let Ok(branch) = Regex::new(r"^\s*([^()\s]+)\)\s*(?:export\s+)?ARCH=(\S+)") else {
        return host_arch.to_string();
    };
    // unconditional: `ARCH=noarch`
    let Ok(plain) = Regex::new(r"^\s*(?:export\s+)?ARCH=([^$\s][^\s;]*)\s*$") else {
        return host_arch.to_string();
    };

    let mut default_branch = None;

    for line in text.lines() {
        if let Some(caps) = branch.captures(line) {
            let patterns = &caps[1];
            let value = resolve_arch_value(&caps[2], host_arch);
            if patterns.split('|').any(|p| glob_match(p, host_arch)) {
                return value;
            }
            if patterns == "*" && default_branch.is_none() {
                default_branch = Some(value);
            }
            continue;
        }
        if let Some(caps) = plain.captures(line) {
            return trim_quotes(&caps[1]).to_string();
        }
    }

    default_branch.unwrap_or_else(|| host_arch.to_string())
}

/// Resolve a branch's right-hand side; `$(uname -m)` means the host arch.
fn resolve_arch_value(value: &str, host_arch: &str) -> String {
    let value = trim_quotes(value.trim_end_matches(';'));
    if value.contains("uname") {
        host_arch.to_string()
    } else {
        value.to_string()
    }
}

fn trim_quotes(value: &str) -> &str {
    value.trim_matches('"')
}

/// Shell-style glob match supporting `*` and `?`.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(p: &[u8], t: &[u8]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some(b'*'), _) => inner(&p[1..], t) || (!t.is_empty() && inner(p, &t[1..])),
            (Some(b'?'), Some(_)) => inner(&p[1..], &t[1..]),
            (Some(a), Some(b)) if a == b => inner(&p[1..], &t[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPICAL: &str = r#"#!/bin/sh
PKGNAM=foo
VERSION=${VERSION:-1.0}
BUILD=${BUILD:-2}
TAG=${TAG:-_msb}

if [ -z "$ARCH" ]; then
  case "$(uname -m)" in
    i?86) ARCH=i586 ;;
    arm*) ARCH=arm ;;
       *) ARCH=$(uname -m) ;;
  esac
fi
"#;

    #[test]
    fn test_build_and_tag_fallbacks() {
        let info = BuildInfo::from_script_text(TYPICAL, "x86_64");
        assert_eq!(info.build, "2");
        assert_eq!(info.tag, "_msb");
    }

    #[test]
    fn test_arch_default_branch_resolves_uname() {
        let info = BuildInfo::from_script_text(TYPICAL, "x86_64");
        assert_eq!(info.arch, "x86_64");
    }

    #[test]
    fn test_arch_glob_branch_matches_host() {
        let info = BuildInfo::from_script_text(TYPICAL, "i686");
        assert_eq!(info.arch, "i586");

        let info = BuildInfo::from_script_text(TYPICAL, "armv7l");
        assert_eq!(info.arch, "arm");
    }

    #[test]
    fn test_plain_noarch_assignment() {
        let text = "PKGNAM=docs\nARCH=noarch\nBUILD=${BUILD:-1}\n";
        let info = BuildInfo::from_script_text(text, "x86_64");
        assert_eq!(info.arch, "noarch");
    }

    #[test]
    fn test_no_markers_falls_back_to_host() {
        let info = BuildInfo::from_script_text("#!/bin/sh\nmake\n", "riscv64");
        assert_eq!(info.arch, "riscv64");
        assert_eq!(info.build, "1");
        assert_eq!(info.tag, "_SBo");
    }

    #[test]
    fn test_full_artifact_name() {
        let info = BuildInfo {
            arch: "x86_64".to_string(),
            build: "2".to_string(),
            tag: "_msb".to_string(),
        };
        assert_eq!(info.full_artifact_name("foo", "1.0"), "foo-1.0-x86_64-2_msb");
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("i?86", "i686"));
        assert!(glob_match("arm*", "armv7l"));
        assert!(glob_match("*", "anything"));
        assert!(!glob_match("i?86", "x86_64"));
    }

    #[test]
    fn test_alternation_branch() {
        let text = "case \"$(uname -m)\" in\n  x86_64|amd64) ARCH=x86_64 ;;\nesac\n";
        let info = BuildInfo::from_script_text(text, "amd64");
        assert_eq!(info.arch, "x86_64");
    }
}
