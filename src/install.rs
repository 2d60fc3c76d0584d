//! Installer invocation.
//!
//! The built artifact is expected at `<artifact_dir>/<full_name>.txz`; the
//! configured installer (upgradepkg by convention) is invoked with
//! `--reinstall --install-new` so the same command covers first installs,
//! reinstalls, and upgrades. A rename is expressed as `<prior>%<path>`,
//! which tells the installer to replace the old package atomically.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use crate::config::Settings;

/// Errors from invoking the installer.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("built artifact not found at {0}")]
    ArtifactMissing(PathBuf),

    #[error("failed to start installer {installer}: {source}")]
    Spawn {
        installer: String,
        #[source]
        source: io::Error,
    },

    #[error("installer exited with {status} for {artifact}")]
    Failed {
        artifact: String,
        status: std::process::ExitStatus,
    },
}

/// Install the artifact named `full_name`, replacing `prior` when the
/// package was renamed.
pub fn install(
    settings: &Settings,
    full_name: &str,
    prior: Option<&str>,
) -> Result<(), InstallError> {
    let artifact = artifact_path(&settings.artifact_dir, full_name);
    if !artifact.is_file() {
        return Err(InstallError::ArtifactMissing(artifact));
    }

    let target = installer_target(&artifact, prior);
    let status = Command::new(&settings.installer)
        .arg("--reinstall")
        .arg("--install-new")
        .arg(&target)
        .status()
        .map_err(|source| InstallError::Spawn {
            installer: settings.installer.display().to_string(),
            source,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(InstallError::Failed {
            artifact: target,
            status,
        })
    }
}

/// On-disk location of a built artifact.
pub fn artifact_path(artifact_dir: &Path, full_name: &str) -> PathBuf {
    artifact_dir.join(format!("{full_name}.txz"))
}

/// Final installer argument: the artifact path, prefixed `prior%` on rename.
fn installer_target(artifact: &Path, prior: Option<&str>) -> String {
    match prior {
        Some(prior) => format!("{}%{}", prior, artifact.display()),
        None => artifact.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_path() {
        assert_eq!(
            artifact_path(Path::new("/tmp"), "foo-1.0-x86_64-1_SBo"),
            PathBuf::from("/tmp/foo-1.0-x86_64-1_SBo.txz")
        );
    }

    #[test]
    fn test_installer_target_plain() {
        let target = installer_target(Path::new("/tmp/foo-1.0-x86_64-1_SBo.txz"), None);
        assert_eq!(target, "/tmp/foo-1.0-x86_64-1_SBo.txz");
    }

    #[test]
    fn test_installer_target_rename() {
        let target = installer_target(
            Path::new("/tmp/foo2-2.0-x86_64-1_SBo.txz"),
            Some("foo"),
        );
        assert_eq!(target, "foo%/tmp/foo2-2.0-x86_64-1_SBo.txz");
    }

    #[test]
    fn test_missing_artifact_fails_before_spawn() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = Settings {
            artifact_dir: dir.path().to_path_buf(),
            // Would fail loudly if it were ever spawned
            installer: PathBuf::from("/nonexistent/installer"),
            ..Settings::default()
        };
        let err = install(&settings, "foo-1.0-x86_64-1_SBo", None).unwrap_err();
        assert!(matches!(err, InstallError::ArtifactMissing(_)));
    }
}
