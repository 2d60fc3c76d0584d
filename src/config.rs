//! Runner settings.
//!
//! Settings come from a single TOML file with built-in defaults for every
//! field, so a bare `compile_orders` list is a complete configuration:
//!
//! ```toml
//! repo_root = "/usr/src/slackrepo"
//! compile_orders = ["desktop/compile-order", "extra/compile-order"]
//! log_dir = "/var/log/slackrun"
//! ```
//!
//! Without `--config`, `~/.config/slackrun/config.toml` is used when it
//! exists; otherwise the defaults stand alone.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Loaded runner configuration. Immutable for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root of the source-package tree
    #[serde(default = "default_repo_root")]
    pub repo_root: PathBuf,

    /// Compile-order files, relative to `repo_root`, processed in list order
    #[serde(default)]
    pub compile_orders: Vec<PathBuf>,

    /// Directory receiving per-package build logs
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Scratch directory handed to build scripts as `TMP`
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Directory where built artifacts land (`OUTPUT`) and are installed from
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Install database: a package is installed iff an entry with its full
    /// artifact name exists here
    #[serde(default = "default_install_db")]
    pub install_db: PathBuf,

    /// Installer command invoked with the built artifact
    #[serde(default = "default_installer")]
    pub installer: PathBuf,
}

fn default_repo_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/slackrun")
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("/tmp/slackrun")
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_install_db() -> PathBuf {
    PathBuf::from("/var/log/packages")
}

fn default_installer() -> PathBuf {
    PathBuf::from("/sbin/upgradepkg")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            repo_root: default_repo_root(),
            compile_orders: Vec::new(),
            log_dir: default_log_dir(),
            build_dir: default_build_dir(),
            artifact_dir: default_artifact_dir(),
            install_db: default_install_db(),
            installer: default_installer(),
        }
    }
}

/// Errors loading settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl Settings {
    /// Load settings from `path` if given, from the default config location
    /// if one exists, or fall back to built-in defaults.
    ///
    /// A path passed explicitly must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_file(path),
            None => match default_config_path() {
                Some(path) if path.is_file() => Self::load_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let label = path.display().to_string();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: label.clone(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: label,
            source,
        })
    }

    /// Absolute paths of the configured compile-order files, in list order.
    pub fn compile_order_paths(&self) -> Vec<PathBuf> {
        self.compile_orders
            .iter()
            .map(|rel| self.repo_root.join(rel))
            .collect()
    }
}

/// Default config location: `~/.config/slackrun/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| {
        Path::new(&home)
            .join(".config")
            .join("slackrun")
            .join("config.toml")
    })
}
