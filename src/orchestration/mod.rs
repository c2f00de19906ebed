//! Orchestration layer for the bump workflow
//!
//! Glues the pieces together: resolve the target version, work out which
//! config files are in scope, find an assignee, and drive git through the
//! redacting pipeline.

pub mod git;
pub mod oncall;
pub mod paths;
pub mod upstream;

pub use git::GitCli;
pub use paths::{cd_to_root_dir, is_under_path};

use secrecy::SecretString;
use std::fs;
use std::path::Path;
use tracing::info;
use walkdir::WalkDir;

use crate::core::{BumpError, BumpOptions, LATEST_VERSION, UPSTREAM_VERSION};
use crate::security::secret_store::SecretStoreError;
use crate::security::SecretStore;

/// Outcome of one bump run.
#[derive(Debug, Clone)]
pub struct BumpSummary {
    /// The concrete version every in-scope reference is moved to
    pub target_version: String,

    /// Config files in scope for the change, relative to the repo root
    pub planned_files: Vec<String>,

    /// Assignment line for the PR body, possibly empty
    pub assignment: String,

    /// Whether a commit was pushed to the fork
    pub pushed: bool,
}

/// Runs one bump end to end.
///
/// Validation happens first so a misconfigured run fails before any
/// subprocess or network call. The secret store is primed with the GitHub
/// token before git runs, so the token can never reach stdout or stderr in
/// the clear.
pub async fn run_bump(options: &BumpOptions) -> Result<BumpSummary, BumpError> {
    options.validate()?;

    let store = SecretStore::new();
    if let Some(token_path) = options.token_path() {
        store.start(vec![token_path], None)?;
    }

    let target_version = resolve_target_version(options).await?;
    info!(version = %target_version, "resolved target version");

    let planned_files = plan_config_files(
        Path::new("."),
        &options.included_config_paths,
        &options.excluded_config_paths,
    );
    for file in &planned_files {
        info!(file, "config file in scope");
    }

    let assignment = oncall::get_assignment(&options.oncall_url, &options.oncall_group).await;

    if options.skip_pull_request {
        return Ok(BumpSummary {
            target_version,
            planned_files,
            assignment,
            pushed: false,
        });
    }

    let git = GitCli::new(store.clone());
    if !git.has_changes().await? {
        info!("working tree is clean, nothing to push");
        return Ok(BumpSummary {
            target_version,
            planned_files,
            assignment,
            pushed: false,
        });
    }

    let message = commit_message(&target_version, &assignment);
    git.commit(&options.git_name, &options.git_email, &message)
        .await?;

    let token = read_token(options)?;
    git.push(
        &options.github_login,
        &token,
        &options.github_repo,
        &options.remote_branch,
    )
    .await?;

    Ok(BumpSummary {
        target_version,
        planned_files,
        assignment,
        pushed: true,
    })
}

/// Resolves the version selector to a concrete version, querying upstream
/// for the sentinel values.
async fn resolve_target_version(options: &BumpOptions) -> Result<String, BumpError> {
    match options.target_version.as_str() {
        LATEST_VERSION | UPSTREAM_VERSION => {
            let version = upstream::parse_upstream_image_version(&options.upstream_url).await?;
            Ok(version)
        }
        literal => Ok(literal.to_string()),
    }
}

/// Enumerates the config files a bump is allowed to touch: every file under
/// an included prefix that is not under an excluded one.
pub fn plan_config_files(base: &Path, included: &[String], excluded: &[String]) -> Vec<String> {
    let mut files = Vec::new();
    for prefix in included {
        let root = base.join(prefix.trim_end_matches('/'));
        for entry in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(base) else {
                continue;
            };
            let name = relative.to_string_lossy().to_string();
            if is_under_path(&name, excluded) {
                continue;
            }
            files.push(name);
        }
    }
    files.sort();
    files.dedup();
    files
}

fn commit_message(version: &str, assignment: &str) -> String {
    if assignment.is_empty() {
        format!("Bump image references to {version}")
    } else {
        format!("Bump image references to {version}\n\n{assignment}")
    }
}

fn read_token(options: &BumpOptions) -> Result<SecretString, SecretStoreError> {
    let path = Path::new(&options.github_token_path).to_path_buf();
    let raw = fs::read_to_string(&path).map_err(|source| SecretStoreError::ReadFailed {
        path: path.clone(),
        source,
    })?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SecretStoreError::EmptySecret { path });
    }
    Ok(SecretString::new(trimmed.to_string().into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OptionsError;
    use std::fs;
    use tempfile::TempDir;

    fn options_skipping_pr() -> BumpOptions {
        BumpOptions {
            github_org: String::new(),
            github_repo: String::new(),
            github_login: String::new(),
            github_token_path: String::new(),
            git_name: "whatever-name".to_string(),
            git_email: "whatever@example.com".to_string(),
            remote_branch: String::new(),
            skip_pull_request: true,
            bump_service_images: true,
            bump_test_images: false,
            target_version: "v20200101-aaaaaaaaaa".to_string(),
            upstream_url: String::new(),
            oncall_url: String::new(),
            oncall_group: "testinfra".to_string(),
            included_config_paths: vec!["nonexistent-config-dir/".to_string()],
            excluded_config_paths: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_invalid_options_fail_before_any_io() {
        let mut options = options_skipping_pr();
        options.included_config_paths = Vec::new();

        let err = run_bump(&options).await.unwrap_err();
        assert!(matches!(
            err,
            BumpError::Configuration(OptionsError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_literal_version_run_with_pr_skipped() {
        let summary = run_bump(&options_skipping_pr()).await.unwrap();
        assert_eq!(summary.target_version, "v20200101-aaaaaaaaaa");
        assert!(summary.planned_files.is_empty());
        assert!(!summary.pushed);
    }

    #[tokio::test]
    async fn test_sentinel_version_requires_upstream_url() {
        let mut options = options_skipping_pr();
        options.target_version = LATEST_VERSION.to_string();

        let err = run_bump(&options).await.unwrap_err();
        assert!(matches!(err, BumpError::Upstream(_)));
    }

    #[test]
    fn test_plan_collects_files_under_included_prefixes() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("config/prow/jobs")).unwrap();
        fs::create_dir_all(dir.path().join("config/prow-staging")).unwrap();
        fs::write(dir.path().join("config/prow/config.yaml"), "x").unwrap();
        fs::write(dir.path().join("config/prow/jobs/jobs.yaml"), "x").unwrap();
        fs::write(dir.path().join("config/prow-staging/config.yaml"), "x").unwrap();

        let files = plan_config_files(
            dir.path(),
            &["config/prow/".to_string()],
            &["config/prow/jobs/".to_string()],
        );
        assert_eq!(files, vec!["config/prow/config.yaml".to_string()]);
    }

    #[test]
    fn test_plan_with_missing_prefix_is_empty() {
        let dir = TempDir::new().unwrap();
        let files = plan_config_files(dir.path(), &["no-such-dir/".to_string()], &[]);
        assert!(files.is_empty());
    }

    #[test]
    fn test_commit_message_with_and_without_assignment() {
        assert_eq!(
            commit_message("v1", ""),
            "Bump image references to v1"
        );
        assert_eq!(
            commit_message("v1", "/cc @someone"),
            "Bump image references to v1\n\n/cc @someone"
        );
    }

    #[test]
    fn test_read_token_trims_and_rejects_empty() {
        let dir = TempDir::new().unwrap();
        let token_file = dir.path().join("token");
        fs::write(&token_file, "tok-123\n").unwrap();

        let mut options = options_skipping_pr();
        options.github_token_path = token_file.to_string_lossy().to_string();
        let token = read_token(&options).unwrap();
        use secrecy::ExposeSecret;
        assert_eq!(token.expose_secret(), "tok-123");

        fs::write(&token_file, "\n").unwrap();
        assert!(matches!(
            read_token(&options),
            Err(SecretStoreError::EmptySecret { .. })
        ));
    }
}
