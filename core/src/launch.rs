//! Hand-off to the entrypoint script.
//!
//! [`exec`] replaces the launcher with the entrypoint so the script's exit
//! code becomes the process exit code. [`run`] spawns it as a child instead
//! and reports its status.

use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

use crate::env::Environment;
use crate::error::{Error, Result};
use crate::manifest::ImageManifest;
use crate::recipe::CREDENTIALS_VAR;

/// Exit code when the entrypoint does not exist.
pub const EXIT_NOT_FOUND: i32 = 127;

/// Exit code when the entrypoint exists but cannot be executed.
pub const EXIT_NOT_EXECUTABLE: i32 = 126;

/// Builds the command for the entrypoint described by `manifest`.
///
/// The environment is the launcher's own, with the bound variables on top.
pub fn command(manifest: &ImageManifest) -> Result<Command> {
    if !manifest.workdir.is_dir() {
        return Err(Error::Manifest {
            path: manifest.workdir.clone(),
            reason: "working directory does not exist".to_string(),
        });
    }

    let environment = manifest.env.with_runtime_overrides();
    warn_on_missing_credentials(&environment);

    tracing::info!(
        entrypoint = ?manifest.entrypoint,
        workdir = ?manifest.workdir,
        vars = ?environment.names(),
        "launching entrypoint"
    );

    let mut cmd = Command::new(&manifest.entrypoint);
    cmd.current_dir(&manifest.workdir)
        .envs(environment.iter())
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    Ok(cmd)
}

/// Replaces the current process with the entrypoint.
///
/// Only returns if the entrypoint could not be started.
pub fn exec(manifest: &ImageManifest) -> Error {
    let mut cmd = match command(manifest) {
        Ok(cmd) => cmd,
        Err(e) => return e,
    };
    let source = cmd.exec();
    Error::Launch {
        path: manifest.entrypoint.clone(),
        source,
    }
}

/// Runs the entrypoint as a child process and waits for it.
pub fn run(manifest: &ImageManifest) -> Result<ExitStatus> {
    let mut cmd = command(manifest)?;
    let launch_err = |source: std::io::Error| Error::Launch {
        path: manifest.entrypoint.clone(),
        source,
    };

    let mut child = cmd.spawn().map_err(launch_err)?;
    let status = child.wait().map_err(launch_err)?;

    tracing::info!(status = %status, "entrypoint exited");
    Ok(status)
}

/// Maps a child's exit status to the code a shell would report.
pub fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}

/// Maps a failure to start the entrypoint to a shell-style exit code.
pub fn exit_code_for_error(err: &Error) -> i32 {
    match err {
        Error::Launch { source, .. } => match source.kind() {
            std::io::ErrorKind::NotFound => EXIT_NOT_FOUND,
            std::io::ErrorKind::PermissionDenied => EXIT_NOT_EXECUTABLE,
            _ if source.raw_os_error() == Some(libc::ENOEXEC) => EXIT_NOT_EXECUTABLE,
            _ => 1,
        },
        _ => 1,
    }
}

// Whether the credentials file exists is the entrypoint's concern.
fn warn_on_missing_credentials(environment: &Environment) {
    if let Some(path) = environment.get(CREDENTIALS_VAR) {
        if !path.is_empty() && !PathBuf::from(path).exists() {
            tracing::warn!(path = %path, "credentials file not found");
        }
    }
}
