//! Image Bumper CLI
//!
//! Bumps container-image version references in a config tree and pushes the
//! change for a pull request, with all subprocess output passing through the
//! secret-redacting pipeline.

use anyhow::Result;
use clap::Parser;
use image_bumper::core::{BumpOptions, LATEST_VERSION};
use image_bumper::orchestration::{self, run_bump};
use std::process;

/// Bump container-image version references and push the change
#[derive(Parser)]
#[command(name = "image-bumper")]
#[command(version = "0.1.0")]
#[command(about = "Bump container-image version references and push the change", long_about = None)]
struct Cli {
    /// GitHub organization owning the target repository
    #[arg(long, default_value = "")]
    github_org: String,

    /// Target repository name
    #[arg(long, default_value = "")]
    github_repo: String,

    /// GitHub login used for the push remote
    #[arg(long, default_value = "")]
    github_login: String,

    /// Path to a file containing the GitHub token
    #[arg(long, default_value = "")]
    github_token_path: String,

    /// Author name for generated commits
    #[arg(long, default_value = "")]
    git_name: String,

    /// Author email for generated commits
    #[arg(long, default_value = "")]
    git_email: String,

    /// Branch on the fork to force-push to
    #[arg(long, default_value = "")]
    remote_branch: String,

    /// Skip the commit-and-push phase
    #[arg(long)]
    skip_pull_request: bool,

    /// Bump service image references
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    bump_service_images: bool,

    /// Bump test image references
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    bump_test_images: bool,

    /// Target version: "latest", "upstream", or a literal tag
    #[arg(long, default_value = LATEST_VERSION)]
    target_version: String,

    /// URL of the upstream config used to resolve sentinel versions
    #[arg(long, default_value = "")]
    upstream_url: String,

    /// URL returning the current oncall roster
    #[arg(long, default_value = "")]
    oncall_url: String,

    /// Rota name to look up in the oncall roster
    #[arg(long, default_value = "testinfra")]
    oncall_group: String,

    /// Config path prefix changes are restricted to (repeatable)
    #[arg(long = "include-config-path")]
    include_config_paths: Vec<String>,

    /// Config path prefix excluded from changes (repeatable)
    #[arg(long = "exclude-config-path")]
    exclude_config_paths: Vec<String>,
}

impl Cli {
    fn into_options(self) -> BumpOptions {
        BumpOptions {
            github_org: self.github_org,
            github_repo: self.github_repo,
            github_login: self.github_login,
            github_token_path: self.github_token_path,
            git_name: self.git_name,
            git_email: self.git_email,
            remote_branch: self.remote_branch,
            skip_pull_request: self.skip_pull_request,
            bump_service_images: self.bump_service_images,
            bump_test_images: self.bump_test_images,
            target_version: self.target_version,
            upstream_url: self.upstream_url,
            oncall_url: self.oncall_url,
            oncall_group: self.oncall_group,
            included_config_paths: self.include_config_paths,
            excluded_config_paths: self.exclude_config_paths,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let options = cli.into_options();

    println!("\n🔼 image-bumper\n");

    // Fail on every configuration problem at once, before touching anything.
    if let Err(e) = options.validate() {
        eprintln!("❌ {}", e);
        return Ok(1);
    }

    orchestration::cd_to_root_dir()?;

    match run_bump(&options).await {
        Ok(summary) => {
            println!("Target version: {}", summary.target_version);
            println!("Config files in scope: {}", summary.planned_files.len());
            if !summary.assignment.is_empty() {
                println!("{}", summary.assignment);
            }
            if summary.pushed {
                println!("\n✅ Changes pushed to {}", options.remote_branch);
            } else {
                println!("\n✅ Done, nothing pushed");
            }
            Ok(0)
        }
        Err(e) => {
            eprintln!("\n❌ Bump failed [{}]: {}", e.code(), e);
            Ok(1)
        }
    }
}
