//! Error handling for bump runs
//!
//! Module-level errors stay close to the code that raises them; this type
//! aggregates them at the workflow boundary using the thiserror crate.

use thiserror::Error;

use crate::core::options::OptionsError;
use crate::orchestration::paths::WorkspaceError;
use crate::orchestration::upstream::UpstreamError;
use crate::security::command_runner::RunnerError;
use crate::security::secret_store::SecretStoreError;

/// Main error type for a bump run
#[derive(Error, Debug)]
pub enum BumpError {
    /// Invalid combination of options, detected before any I/O
    #[error(transparent)]
    Configuration(#[from] OptionsError),

    /// Secret sources could not be loaded
    #[error(transparent)]
    Secrets(#[from] SecretStoreError),

    /// A subprocess failed to start or exited abnormally
    #[error(transparent)]
    Execution(#[from] RunnerError),

    /// The upstream version could not be resolved
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The repository root could not be located
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

impl BumpError {
    /// Get a stable error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Secrets(_) => "SECRET_LOAD_ERROR",
            Self::Execution(_) => "EXECUTION_ERROR",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::Workspace(_) => "WORKSPACE_ERROR",
        }
    }

    /// Configuration problems are fatal and never worth retrying; everything
    /// else depends on external state that may change.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }
}
