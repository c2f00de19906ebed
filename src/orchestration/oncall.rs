//! Oncall assignment for generated pull requests
//!
//! Fetches the current oncall roster and renders the assignment line placed
//! in the PR body. Assignment is best-effort: any failure renders an
//! explanatory sentence instead of failing the run.

use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

/// Roster document served by the oncall endpoint:
/// `{"Oncall": {"<rota>": "<github-login>"}}`.
#[derive(Debug, Deserialize)]
struct OncallRoster {
    #[serde(rename = "Oncall")]
    oncall: HashMap<String, String>,
}

/// Returns the assignment line for the PR body.
///
/// An empty `oncall_url` disables assignment and returns an empty string.
pub async fn get_assignment(oncall_url: &str, rota: &str) -> String {
    if oncall_url.is_empty() {
        return String::new();
    }

    match fetch_oncaller(oncall_url, rota).await {
        Ok(assignment) => render_assignment(assignment.as_deref()),
        Err(e) => {
            warn!(url = oncall_url, error = %e, "oncall lookup failed");
            format!("An error occurred while finding an assignee: `{e}`.")
        }
    }
}

async fn fetch_oncaller(oncall_url: &str, rota: &str) -> Result<Option<String>, reqwest::Error> {
    let roster: OncallRoster = reqwest::get(oncall_url)
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(roster.oncall.get(rota).cloned().filter(|name| !name.is_empty()))
}

fn render_assignment(oncaller: Option<&str>) -> String {
    match oncaller {
        Some(name) => format!("/cc @{name}"),
        None => {
            "Nobody is currently oncall, so falling back to Blunderbuss-based assignment instead."
                .to_string()
        }
    }
}
