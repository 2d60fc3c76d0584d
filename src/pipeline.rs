//! Package actions and the per-package error taxonomy.
//!
//! Three actions share one signature: given the run environment, a package
//! directory, its freshly parsed descriptor, and an optional prior name,
//! produce either a step outcome or the `PackageError` that ends the whole
//! compile order.
//!
//! - `Download` fetches and verifies every source.
//! - `Build` skips already-installed artifacts, otherwise downloads, runs
//!   the build script, and installs the result.
//! - `Install` re-installs an already-built artifact without rebuilding.
//!
//! Checksum verification is aggregated: every source contributes its
//! computed digest (cache hits contribute their verified one), and the full
//! list is compared positionally against the descriptor in one pass, so a
//! package gets at most one `ChecksumMismatch` regardless of how many
//! sources diverged.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::Command;

use thiserror::Error;

use crate::buildinfo::BuildInfo;
use crate::checksum::digests_match;
use crate::config::Settings;
use crate::descriptor::PackageDescriptor;
use crate::executor;
use crate::fetch::{self, FetchError};
use crate::install::{self, InstallError};

/// Immutable per-run context: host architecture plus loaded settings.
/// Built once in `main` and shared read-only by every step.
#[derive(Debug, Clone)]
pub struct RunEnvironment {
    /// Host architecture as `uname -m` reports it (e.g. "x86_64")
    pub arch: String,

    /// Loaded configuration
    pub settings: Settings,
}

impl RunEnvironment {
    /// Detect the host architecture and wrap the settings.
    pub fn new(settings: Settings) -> Self {
        Self {
            arch: detect_host_arch(),
            settings,
        }
    }

    /// Build with an explicit architecture (tests, cross checks).
    pub fn with_arch(settings: Settings, arch: impl Into<String>) -> Self {
        Self {
            arch: arch.into(),
            settings,
        }
    }
}

/// `uname -m`, falling back to the compile-time architecture.
fn detect_host_arch() -> String {
    Command::new("uname")
        .arg("-m")
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| std::env::consts::ARCH.to_string())
}

/// The three selectable package actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Fetch and verify sources only
    Download,
    /// Download, build, and install
    Build,
    /// Install an already-built artifact
    Install,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Download => "download",
            Action::Build => "build",
            Action::Install => "install",
        };
        f.write_str(name)
    }
}

/// What one successful step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The action ran to completion
    Done,
    /// Build skipped: the exact artifact is already installed
    AlreadyInstalled,
}

/// Terminal per-package failure. Any instance aborts the rest of the
/// compile order; nothing is retried or rolled back.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("{package}: {reason}")]
    Parse { package: String, reason: String },

    #[error("{package}: unsupported download URL {url}")]
    UnsupportedDownload { package: String, url: String },

    #[error("{package}: {source}")]
    Download {
        package: String,
        #[source]
        source: FetchError,
    },

    #[error("{package}: source checksum mismatch ({detail})")]
    ChecksumMismatch { package: String, detail: String },

    #[error("{package}: build failed: {reason}")]
    Build { package: String, reason: String },

    #[error("{package}: {source}")]
    Install {
        package: String,
        #[source]
        source: InstallError,
    },
}

impl PackageError {
    /// Name of the package the failure belongs to.
    pub fn package(&self) -> &str {
        match self {
            PackageError::Parse { package, .. }
            | PackageError::UnsupportedDownload { package, .. }
            | PackageError::Download { package, .. }
            | PackageError::ChecksumMismatch { package, .. }
            | PackageError::Build { package, .. }
            | PackageError::Install { package, .. } => package,
        }
    }

    /// Stable failure kind label for summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            PackageError::Parse { .. } => "parse",
            PackageError::UnsupportedDownload { .. } => "unsupported-download",
            PackageError::Download { .. } => "download",
            PackageError::ChecksumMismatch { .. } => "checksum-mismatch",
            PackageError::Build { .. } => "build",
            PackageError::Install { .. } => "install",
        }
    }

    /// Stable process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            PackageError::Parse { .. } => 10,
            PackageError::UnsupportedDownload { .. } => 20,
            PackageError::Download { .. } => 21,
            PackageError::ChecksumMismatch { .. } => 22,
            PackageError::Build { .. } => 30,
            PackageError::Install { .. } => 40,
        }
    }
}

/// Result type for package actions.
pub type ActionResult = Result<StepOutcome, PackageError>;

/// Apply `action` to one package.
pub fn run_action(
    env: &RunEnvironment,
    action: Action,
    package_dir: &Path,
    descriptor: &PackageDescriptor,
    prior: Option<&str>,
) -> ActionResult {
    match action {
        Action::Download => download_action(env, package_dir, descriptor),
        Action::Build => build_action(env, package_dir, descriptor, prior),
        Action::Install => install_action(env, package_dir, descriptor, prior),
    }
}

/// Fetch every source serially, then verify the whole digest set at once.
fn download_action(
    _env: &RunEnvironment,
    package_dir: &Path,
    descriptor: &PackageDescriptor,
) -> ActionResult {
    let mut computed = Vec::with_capacity(descriptor.downloads.len());

    // Deliberately sequential, in declared order: mismatch attribution
    // depends on deterministic per-URL ordering.
    for (url, expected) in descriptor.downloads.iter().zip(&descriptor.checksums) {
        let digest = fetch::ensure_source(package_dir, url, expected).map_err(|err| match err {
            FetchError::Unsupported(url) => PackageError::UnsupportedDownload {
                package: descriptor.name.clone(),
                url,
            },
            other => PackageError::Download {
                package: descriptor.name.clone(),
                source: other,
            },
        })?;
        computed.push(digest);
    }

    verify_digests(descriptor, &computed)?;
    Ok(StepOutcome::Done)
}

/// Positional comparison of the whole computed set; one mismatch verdict
/// per package.
fn verify_digests(descriptor: &PackageDescriptor, computed: &[String]) -> Result<(), PackageError> {
    let mismatches: Vec<String> = descriptor
        .checksums
        .iter()
        .zip(computed)
        .zip(&descriptor.downloads)
        .filter(|((expected, digest), _)| !digests_match(digest, expected))
        .map(|((_, _), url)| url.clone())
        .collect();

    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(PackageError::ChecksumMismatch {
            package: descriptor.name.clone(),
            detail: mismatches.join(", "),
        })
    }
}

/// Download, build, and install one package, skipping work the install
/// database already records. Output goes to the process stdout.
fn build_action(
    env: &RunEnvironment,
    package_dir: &Path,
    descriptor: &PackageDescriptor,
    prior: Option<&str>,
) -> ActionResult {
    build_action_with_console(env, package_dir, descriptor, prior, Box::new(io::stdout()))
}

/// Re-install an already-built artifact.
fn install_action(
    env: &RunEnvironment,
    package_dir: &Path,
    descriptor: &PackageDescriptor,
    prior: Option<&str>,
) -> ActionResult {
    let (_, _, full_name) = resolve_build(env, package_dir, descriptor)?;
    install::install(&env.settings, &full_name, prior).map_err(|source| PackageError::Install {
        package: descriptor.name.clone(),
        source,
    })?;
    Ok(StepOutcome::Done)
}

/// Locate the build script and compute the full artifact name.
fn resolve_build(
    env: &RunEnvironment,
    package_dir: &Path,
    descriptor: &PackageDescriptor,
) -> Result<(std::path::PathBuf, BuildInfo, String), PackageError> {
    let script = package_dir.join(format!("{}.SlackBuild", descriptor.name));
    let info = BuildInfo::from_script(&script, &env.arch).map_err(|e| PackageError::Build {
        package: descriptor.name.clone(),
        reason: format!("cannot read {}: {}", script.display(), e),
    })?;
    let full_name = info.full_artifact_name(&descriptor.name, &descriptor.version);
    Ok((script, info, full_name))
}

/// Environment handed to the build script, on top of the inherited one.
fn build_script_env(
    env: &RunEnvironment,
    descriptor: &PackageDescriptor,
    info: &BuildInfo,
) -> Vec<(String, String)> {
    vec![
        ("VERSION".to_string(), descriptor.version.clone()),
        ("BUILD".to_string(), info.build.clone()),
        ("TAG".to_string(), info.tag.clone()),
        (
            "TMP".to_string(),
            env.settings.build_dir.display().to_string(),
        ),
        (
            "OUTPUT".to_string(),
            env.settings.artifact_dir.display().to_string(),
        ),
    ]
}

fn build_action_with_console(
    env: &RunEnvironment,
    package_dir: &Path,
    descriptor: &PackageDescriptor,
    prior: Option<&str>,
    console: Box<dyn Write + Send>,
) -> ActionResult {
    let (script, info, full_name) = resolve_build(env, package_dir, descriptor)?;

    // Existence of the install-db entry is the entire "already built" test
    if env.settings.install_db.join(&full_name).exists() {
        return Ok(StepOutcome::AlreadyInstalled);
    }

    // A build always guarantees verified sources first
    download_action(env, package_dir, descriptor)?;

    let build_err = |reason: String| PackageError::Build {
        package: descriptor.name.clone(),
        reason,
    };

    fs::create_dir_all(&env.settings.log_dir)
        .and_then(|_| fs::create_dir_all(&env.settings.build_dir))
        .and_then(|_| fs::create_dir_all(&env.settings.artifact_dir))
        .map_err(|e| build_err(e.to_string()))?;

    let log_path = env
        .settings
        .log_dir
        .join(format!("{}-{}.log", descriptor.name, descriptor.version));
    let script_env = build_script_env(env, descriptor, &info);

    let status = executor::run_build(&script, package_dir, &script_env, console, &log_path)
        .map_err(|e| build_err(e.to_string()))?;

    if !status.success() {
        return Err(build_err(format!(
            "{} exited with {}",
            script.display(),
            status
        )));
    }

    install::install(&env.settings, &full_name, prior).map_err(|source| PackageError::Install {
        package: descriptor.name.clone(),
        source,
    })?;

    Ok(StepOutcome::Done)
}
