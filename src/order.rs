//! Compile-order parsing and the strict-order sequencer.
//!
//! A compile order is one package name per line, in required build
//! sequence; `prior%name` marks a rename: the old package name first, then
//! the package that replaces it, matching the `old%new` convention the
//! installer itself uses. Blank lines and `#` comments are skipped.
//!
//! The sequencer drives one action over the parsed steps in file order.
//! Steps are a dependency chain: step N's build assumes step N-1 is
//! installed, so the first `PackageError` short-circuits everything after
//! it. Package directories resolve relative to the order file's parent,
//! matching the `<repo>/<partition>/<name>/` tree layout.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::descriptor::PackageDescriptor;
use crate::pipeline::{self, Action, ActionResult, PackageError, RunEnvironment, StepOutcome};

/// One compile-order entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    /// Current package name
    pub name: String,

    /// Prior package name the installer must replace, if renamed
    pub prior: Option<String>,
}

/// Errors reading or parsing a compile-order file.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: malformed entry {entry:?}")]
    Malformed {
        path: String,
        line: usize,
        entry: String,
    },
}

/// Parse a compile-order file into ordered build steps.
pub fn parse_compile_order(path: &Path) -> Result<Vec<BuildStep>, OrderError> {
    let label = path.display().to_string();
    let contents = fs::read_to_string(path).map_err(|source| OrderError::Io {
        path: label.clone(),
        source,
    })?;
    parse_compile_order_text(&label, &contents)
}

fn parse_compile_order_text(path: &str, contents: &str) -> Result<Vec<BuildStep>, OrderError> {
    let mut steps = Vec::new();
    for (idx, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let malformed = || OrderError::Malformed {
            path: path.to_string(),
            line: idx + 1,
            entry: line.to_string(),
        };

        let step = match line.split_once('%') {
            // prior name on the left, replacing package on the right
            Some((prior, name)) => {
                let (prior, name) = (prior.trim(), name.trim());
                if name.is_empty() || prior.is_empty() || name.contains('%') {
                    return Err(malformed());
                }
                BuildStep {
                    name: name.to_string(),
                    prior: Some(prior.to_string()),
                }
            }
            None => {
                if line.contains(char::is_whitespace) {
                    return Err(malformed());
                }
                BuildStep {
                    name: line.to_string(),
                    prior: None,
                }
            }
        };
        steps.push(step);
    }
    Ok(steps)
}

/// Tally of one completed compile order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderOutcome {
    /// Steps whose action ran to completion
    pub completed: usize,

    /// Steps skipped because the artifact was already installed
    pub skipped: usize,
}

/// Run `action` over every step of the compile order at `order_path`, in
/// file order, stopping at the first failure.
pub fn run_order(
    env: &RunEnvironment,
    order_path: &Path,
    action: Action,
) -> Result<OrderOutcome, PackageError> {
    run_order_with(order_path, |dir, descriptor, prior| {
        pipeline::run_action(env, action, dir, descriptor, prior)
    })
}

/// Sequencer core, generic over the per-step action.
///
/// Each step resolves its descriptor fresh, then hands (package dir,
/// descriptor, prior name) to `act`. The first error is returned and no
/// later step is touched.
pub fn run_order_with<F>(order_path: &Path, mut act: F) -> Result<OrderOutcome, PackageError>
where
    F: FnMut(&Path, &PackageDescriptor, Option<&str>) -> ActionResult,
{
    let steps = parse_compile_order(order_path).map_err(|e| PackageError::Parse {
        package: order_label(order_path),
        reason: e.to_string(),
    })?;

    let partition = order_path.parent().unwrap_or(Path::new("."));
    let mut outcome = OrderOutcome::default();

    for step in steps {
        let package_dir = partition.join(&step.name);
        let descriptor = PackageDescriptor::resolve(&package_dir, &step.name).map_err(|e| {
            PackageError::Parse {
                package: step.name.clone(),
                reason: e.to_string(),
            }
        })?;

        match act(&package_dir, &descriptor, step.prior.as_deref())? {
            StepOutcome::Done => outcome.completed += 1,
            StepOutcome::AlreadyInstalled => outcome.skipped += 1,
        }
    }

    Ok(outcome)
}

fn order_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_parse_plain_and_rename_entries() {
        let text = "# base packages\nfoo\noldbar%bar\n\nbaz\n";
        let steps = parse_compile_order_text("compile-order", text).unwrap();
        assert_eq!(
            steps,
            vec![
                BuildStep {
                    name: "foo".to_string(),
                    prior: None
                },
                BuildStep {
                    name: "bar".to_string(),
                    prior: Some("oldbar".to_string())
                },
                BuildStep {
                    name: "baz".to_string(),
                    prior: None
                },
            ]
        );
    }

    #[test]
    fn test_parse_rejects_empty_rename_sides() {
        assert!(parse_compile_order_text("o", "%foo\n").is_err());
        assert!(parse_compile_order_text("o", "foo%\n").is_err());
        assert!(parse_compile_order_text("o", "a%b%c\n").is_err());
    }

    #[test]
    fn test_parse_rejects_embedded_whitespace() {
        let err = parse_compile_order_text("o", "foo bar\n").unwrap_err();
        match err {
            OrderError::Malformed { line, .. } => assert_eq!(line, 1),
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    /// Lay out a partition with packages that have valid descriptors.
    fn write_partition(dir: &Path, names: &[&str], order: &str) -> PathBuf {
        for name in names {
            let pkg = dir.join(name);
            fs::create_dir_all(&pkg).unwrap();
            fs::write(
                pkg.join(format!("{name}.info")),
                format!(
                    "PKGNAM=\"{name}\"\nVERSION=\"1.0\"\nDOWNLOAD=\"http://x/{name}.tar.gz\"\n\
                     MD5SUM=\"d41d8cd98f00b204e9800998ecf8427e\"\n"
                ),
            )
            .unwrap();
        }
        let order_file = dir.join("compile-order");
        fs::write(&order_file, order).unwrap();
        order_file
    }

    #[test]
    fn test_short_circuit_on_first_failure() {
        let dir = TempDir::new().unwrap();
        let order_file = write_partition(dir.path(), &["a", "b", "c"], "a\nb\nc\n");

        let mut seen = Vec::new();
        let err = run_order_with(&order_file, |_, descriptor, _| {
            seen.push(descriptor.name.clone());
            if descriptor.name == "b" {
                Err(PackageError::Build {
                    package: "b".to_string(),
                    reason: "boom".to_string(),
                })
            } else {
                Ok(StepOutcome::Done)
            }
        })
        .unwrap_err();

        assert_eq!(seen, vec!["a", "b"]);
        assert_eq!(err.package(), "b");
    }

    #[test]
    fn test_all_steps_run_in_order_on_success() {
        let dir = TempDir::new().unwrap();
        let order_file = write_partition(dir.path(), &["a", "b", "c"], "c\na\nb\n");

        let mut seen = Vec::new();
        let outcome = run_order_with(&order_file, |_, descriptor, _| {
            seen.push(descriptor.name.clone());
            Ok(StepOutcome::Done)
        })
        .unwrap();

        // file order, not alphabetical
        assert_eq!(seen, vec!["c", "a", "b"]);
        assert_eq!(outcome.completed, 3);
        assert_eq!(outcome.skipped, 0);
    }

    #[test]
    fn test_rename_entry_builds_new_package_replacing_prior() {
        let dir = TempDir::new().unwrap();
        // only the new package has a directory; resolving "oldbar" would fail
        let order_file = write_partition(dir.path(), &["bar"], "oldbar%bar\n");

        let mut steps = Vec::new();
        run_order_with(&order_file, |_, descriptor, prior| {
            steps.push((descriptor.name.clone(), prior.map(str::to_string)));
            Ok(StepOutcome::Done)
        })
        .unwrap();

        assert_eq!(steps, vec![("bar".to_string(), Some("oldbar".to_string()))]);
    }

    #[test]
    fn test_missing_descriptor_is_parse_error() {
        let dir = TempDir::new().unwrap();
        // order names a package with no directory
        let order_file = write_partition(dir.path(), &["a"], "a\nghost\n");

        let err = run_order_with(&order_file, |_, _, _| Ok(StepOutcome::Done)).unwrap_err();
        assert_eq!(err.package(), "ghost");
        assert_eq!(err.kind(), "parse");
    }
}
