//! Config path membership and workspace discovery

use std::env;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

/// Environment variable pointing at the workspace root when running under a
/// build system that relocates the process.
const WORKSPACE_ENV: &str = "BUILD_WORKSPACE_DIRECTORY";

/// Errors raised while locating the repository root
#[derive(Error, Debug)]
pub enum WorkspaceError {
    /// The workspace directory could not be entered
    #[error("failed to change directory to {path}: {source}")]
    ChdirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `git rev-parse --show-toplevel` failed
    #[error("failed to locate the git repository root: {0}")]
    GitRootFailed(String),
}

/// Reports whether `file` lives under any of the configured path prefixes.
///
/// Prefixes are treated as directories: `config/prow/` covers
/// `config/prow/jobs/config.yaml` but not `config/prow-staging/config.yaml`.
pub fn is_under_path(file: &str, paths: &[String]) -> bool {
    paths.iter().any(|prefix| {
        if prefix.ends_with('/') {
            file.starts_with(prefix)
        } else {
            file.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
        }
    })
}

/// Changes the working directory to the repository root.
///
/// Honors [`WORKSPACE_ENV`] when set, otherwise asks git for the toplevel of
/// the current checkout.
pub fn cd_to_root_dir() -> Result<(), WorkspaceError> {
    if let Ok(dir) = env::var(WORKSPACE_ENV) {
        let path = PathBuf::from(dir);
        return env::set_current_dir(&path)
            .map_err(|source| WorkspaceError::ChdirFailed { path, source });
    }

    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .output()
        .map_err(|e| WorkspaceError::GitRootFailed(e.to_string()))?;
    if !output.status.success() {
        return Err(WorkspaceError::GitRootFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let path = PathBuf::from(root);
    env::set_current_dir(&path).map_err(|source| WorkspaceError::ChdirFailed { path, source })
}
