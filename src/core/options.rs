//! Run options and their validation
//!
//! All option constraints are checked up front and reported as one
//! aggregated failure, before any subprocess is started or any network call
//! is made.

use std::path::PathBuf;
use thiserror::Error;

/// Sentinel target version meaning "use the latest upstream version".
pub const LATEST_VERSION: &str = "latest";

/// Sentinel target version meaning "use the version pinned by the upstream
/// config".
pub const UPSTREAM_VERSION: &str = "upstream";

/// Errors raised by option validation
#[derive(Error, Debug)]
pub enum OptionsError {
    /// One or more option constraints were violated
    #[error("invalid options: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Options for one bump run.
#[derive(Debug, Clone)]
pub struct BumpOptions {
    /// GitHub organization owning the target repository
    pub github_org: String,

    /// Target repository name
    pub github_repo: String,

    /// GitHub login used for the push remote
    pub github_login: String,

    /// Path to a file holding the GitHub token; also a secret source for the
    /// redaction pipeline
    pub github_token_path: String,

    /// Author name for generated commits
    pub git_name: String,

    /// Author email for generated commits
    pub git_email: String,

    /// Branch on the fork to force-push to
    pub remote_branch: String,

    /// Skip the commit-and-push phase entirely
    pub skip_pull_request: bool,

    /// Bump the service image references
    pub bump_service_images: bool,

    /// Bump the test image references
    pub bump_test_images: bool,

    /// Target version: [`LATEST_VERSION`], [`UPSTREAM_VERSION`], or a
    /// literal tag
    pub target_version: String,

    /// URL of the upstream config used to resolve sentinel versions
    pub upstream_url: String,

    /// URL returning the current oncall assignment, empty to skip assignment
    pub oncall_url: String,

    /// Rota name to look up in the oncall roster
    pub oncall_group: String,

    /// Config path prefixes that changes are restricted to; must not be empty
    pub included_config_paths: Vec<String>,

    /// Config path prefixes excluded from changes
    pub excluded_config_paths: Vec<String>,
}

impl BumpOptions {
    /// Checks every constraint and aggregates all violations into a single
    /// error, so a misconfigured run fails once with the complete picture.
    pub fn validate(&self) -> Result<(), OptionsError> {
        let mut problems = Vec::new();

        if !self.bump_service_images && !self.bump_test_images {
            problems.push(
                "at least one of --bump-service-images or --bump-test-images must be enabled"
                    .to_string(),
            );
        }

        if !self.skip_pull_request {
            for (value, flag) in [
                (&self.github_token_path, "--github-token-path"),
                (&self.github_org, "--github-org"),
                (&self.github_repo, "--github-repo"),
                (&self.remote_branch, "--remote-branch"),
            ] {
                if value.is_empty() {
                    problems.push(format!(
                        "{flag} must not be empty when pull request creation is not skipped"
                    ));
                }
            }
        }

        if self.bump_service_images
            && self.bump_test_images
            && self.target_version != LATEST_VERSION
        {
            problems.push(format!(
                "--target-version must be {LATEST_VERSION:?} when both image classes are bumped"
            ));
        }

        if self.included_config_paths.is_empty() {
            problems.push("--include-config-paths must list at least one path".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(OptionsError::Invalid(problems))
        }
    }

    /// The token file registered as a secret source when pushing is enabled.
    pub fn token_path(&self) -> Option<PathBuf> {
        if self.skip_pull_request || self.github_token_path.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.github_token_path))
        }
    }
}
