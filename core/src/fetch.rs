//! Shallow fetch of the source tree with the git CLI.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::error::{Error, Result};

/// A fetched source snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTree {
    /// Repository the snapshot was fetched from.
    pub url: String,
    /// Root of the checkout on disk.
    pub path: PathBuf,
}

/// Fetches source trees with `git clone`.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    /// Path to the git binary.
    git_path: String,
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl GitFetcher {
    /// Creates a fetcher using the default `git` command.
    pub fn new() -> Self {
        Self {
            git_path: "git".to_string(),
        }
    }

    /// Creates a fetcher with a custom git binary.
    pub fn with_git_path(git_path: impl Into<String>) -> Self {
        Self {
            git_path: git_path.into(),
        }
    }

    /// Clones `url` into `dest`, keeping only the last `depth` commits.
    ///
    /// Fails if `dest` already holds files. There is no retry.
    pub async fn fetch(&self, url: &str, depth: u32, dest: &Path) -> Result<SourceTree> {
        let fetch_err = |reason: String| Error::Fetch {
            url: url.to_string(),
            reason,
        };

        if dest.exists() && !is_empty_dir(dest)? {
            return Err(fetch_err(format!(
                "destination {} already exists and is not empty",
                dest.display()
            )));
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(url = %url, depth, dest = ?dest, "fetching source tree");

        let output = Command::new(&self.git_path)
            .args(["clone", "--depth", &depth.to_string(), "--", url])
            .arg(dest)
            .output()
            .await
            .map_err(|e| fetch_err(format!("failed to run {}: {}", self.git_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fetch_err(stderr.trim().to_string()));
        }

        Ok(SourceTree {
            url: url.to_string(),
            path: dest.to_path_buf(),
        })
    }
}

fn is_empty_dir(path: &Path) -> Result<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    Ok(std::fs::read_dir(path)?.next().is_none())
}
