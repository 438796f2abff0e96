//! Placement of the entrypoint script.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::error::{Error, Result};

/// Copies `source` to `target` unchanged and marks it executable.
///
/// Each read bit is copied to the matching execute bit.
pub fn place_entrypoint(source: &Path, target: &Path) -> Result<()> {
    let place_err = |reason: String| Error::Entrypoint {
        path: target.to_path_buf(),
        reason,
    };

    if !source.is_file() {
        return Err(place_err(format!(
            "source script {} does not exist",
            source.display()
        )));
    }

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::copy(source, target)
        .map_err(|e| place_err(format!("failed to copy {}: {}", source.display(), e)))?;
    make_executable(target)?;

    tracing::info!(source = ?source, target = ?target, "placed entrypoint");
    Ok(())
}

/// Sets the execute bits wherever the read bits are set.
pub fn make_executable(path: &Path) -> Result<()> {
    let mut permissions = std::fs::metadata(path)?.permissions();
    let mode = permissions.mode();
    permissions.set_mode(mode | ((mode & 0o444) >> 2));
    std::fs::set_permissions(path, permissions)?;
    Ok(())
}
