//! slackrun - compile-order build/install runner
//!
//! This crate orchestrates a Slackware-style source-package tree: it walks
//! declared compile orders, downloads and MD5-verifies each package's
//! sources, runs the package's build script with output teed to a log, and
//! installs the built artifact, stopping the whole run at the first failure.

pub mod buildinfo;
pub mod checksum;
pub mod config;
pub mod descriptor;
pub mod executor;
pub mod fetch;
pub mod install;
pub mod order;
pub mod pipeline;
pub mod summary;

pub use config::Settings;
pub use descriptor::PackageDescriptor;
pub use order::{run_order, BuildStep, OrderOutcome};
pub use pipeline::{Action, PackageError, RunEnvironment, StepOutcome};
pub use summary::RunSummary;
