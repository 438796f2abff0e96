//! systest-provisioner - provisions a system-test environment and launches its runner
//!
//! This library fetches a shallow snapshot of a source repository, installs the
//! test-automation package, binds the credentials and project variables, places
//! the runner script, and hands the process over to that script at launch.

pub mod config;
pub mod dockerfile;
pub mod entrypoint;
pub mod env;
pub mod error;
pub mod fetch;
pub mod install;
pub mod launch;
pub mod manifest;
pub mod provision;
pub mod recipe;

pub use config::{Validate, ValidationResult, KNOWN_SCHEMES};
pub use dockerfile::{render_dockerfile, write_build_files, DEFAULT_BASE_IMAGE};
pub use entrypoint::{make_executable, place_entrypoint};
pub use env::{EnvSource, Environment};
pub use error::{Error, Result};
pub use fetch::{GitFetcher, SourceTree};
pub use install::{PackageInstaller, PipInstaller};
pub use launch::{exit_code, exit_code_for_error, EXIT_NOT_EXECUTABLE, EXIT_NOT_FOUND};
pub use manifest::ImageManifest;
pub use provision::{ProvisionedImage, Provisioner};
pub use recipe::{Recipe, CREDENTIALS_VAR, DEFAULT_MANIFEST_NAME, PROJECT_BUILD_ARG, PROJECT_VAR};
