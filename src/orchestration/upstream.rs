//! Upstream image version lookup
//!
//! Resolves the "latest upstream" sentinel by fetching the upstream config
//! over HTTP and extracting the first image tag it pins. The extraction is a
//! pure function so it can be tested without a network.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    /// Matches an image reference line and captures its version tag, e.g.
    /// `image: gcr.io/k8s-prow/deck:v20200717-cf288082e1`.
    static ref IMAGE_TAG: Regex =
        Regex::new(r"image:\s*[a-zA-Z0-9_./-]+:(v[a-zA-Z0-9_.-]+)").unwrap();
}

/// Errors raised while resolving the upstream version
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// No upstream URL was configured
    #[error("upstream URL is empty; cannot resolve the target version")]
    EmptyUrl,

    /// The upstream config could not be fetched
    #[error("failed to fetch upstream config from {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The fetched config contained no image tag
    #[error("no image version found in the config at {url}")]
    NoVersionFound { url: String },
}

/// Fetches the upstream config at `url` and returns the first image version
/// it pins.
pub async fn parse_upstream_image_version(url: &str) -> Result<String, UpstreamError> {
    if url.is_empty() {
        return Err(UpstreamError::EmptyUrl);
    }

    let body = reqwest::get(url)
        .await
        .and_then(|res| res.error_for_status())
        .map_err(|source| UpstreamError::FetchFailed {
            url: url.to_string(),
            source,
        })?
        .text()
        .await
        .map_err(|source| UpstreamError::FetchFailed {
            url: url.to_string(),
            source,
        })?;

    extract_image_version(&body).ok_or_else(|| UpstreamError::NoVersionFound {
        url: url.to_string(),
    })
}

/// Returns the version tag of the first image reference in `body`, if any.
pub fn extract_image_version(body: &str) -> Option<String> {
    body.lines()
        .find_map(|line| IMAGE_TAG.captures(line))
        .map(|captures| captures[1].to_string())
}
