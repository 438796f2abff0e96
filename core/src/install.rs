//! Installation of the test-automation package.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Error, Result};

/// Trait for package installers.
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Installs `package`, running from `working_dir`.
    async fn install(&self, package: &str, working_dir: &Path) -> Result<()>;

    /// Returns the name of this installer.
    fn name(&self) -> &str;
}

/// Installer that shells out to `pip install <package>`.
#[derive(Debug, Clone)]
pub struct PipInstaller {
    /// Path to the pip binary.
    cli_path: String,
}

impl Default for PipInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl PipInstaller {
    /// Creates an installer using the default `pip` command.
    pub fn new() -> Self {
        Self {
            cli_path: "pip".to_string(),
        }
    }

    /// Creates an installer with a custom CLI path.
    pub fn with_cli_path(cli_path: impl Into<String>) -> Self {
        Self {
            cli_path: cli_path.into(),
        }
    }
}

#[async_trait]
impl PackageInstaller for PipInstaller {
    async fn install(&self, package: &str, working_dir: &Path) -> Result<()> {
        let install_err = |reason: String| Error::Install {
            package: package.to_string(),
            reason,
        };

        tracing::info!(
            cli = %self.cli_path,
            package = %package,
            working_dir = ?working_dir,
            "installing package"
        );

        let output = Command::new(&self.cli_path)
            .args(["install", package])
            .current_dir(working_dir)
            .output()
            .await
            .map_err(|e| install_err(format!("failed to run {}: {}", self.cli_path, e)))?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            tracing::debug!(line = %line, "installer stdout");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(install_err(format!(
                "{} exited with {}: {}",
                self.cli_path,
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.cli_path
    }
}
