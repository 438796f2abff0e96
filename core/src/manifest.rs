//! Image manifest: what provisioning produced, read back at launch.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::env::Environment;
use crate::error::{Error, Result};

/// Record of a provisioned environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageManifest {
    /// Unique identifier for this provisioning run.
    pub build_id: String,
    /// Repository the source tree was fetched from.
    pub source_url: String,
    /// Package installed into the environment.
    pub package: String,
    /// Working directory: the root of the fetched tree.
    pub workdir: PathBuf,
    /// Variables bound for the entrypoint.
    pub env: Environment,
    /// Script executed on launch.
    pub entrypoint: PathBuf,
}

impl ImageManifest {
    /// Writes the manifest as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| Error::Manifest {
            path: path.to_path_buf(),
            reason: format!("failed to serialize: {}", e),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reads a manifest written by [`ImageManifest::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Manifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| Error::Manifest {
            path: path.to_path_buf(),
            reason: format!("failed to parse: {}", e),
        })
    }
}
