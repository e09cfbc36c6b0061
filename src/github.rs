use crate::config::RepoId;
use crate::error::DashboardError;
use anyhow::Result;
use chrono::{DateTime, Utc};
use octocrab::service::middleware::retry::RetryConfig;
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of pull requests requested in the single listing call.
pub const PAGE_SIZE: u8 = 100;

/// A pull request object as returned by the listing endpoint.
///
/// Only `created_at` is required; everything else defaults when missing or null.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RawPullRequest {
    #[serde(default)]
    pub number: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<RawUser>,
    #[serde(default)]
    pub labels: Option<Vec<RawLabel>>,
    #[serde(default)]
    pub assignees: Option<Vec<RawUser>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub comments: Option<u64>,
    #[serde(default)]
    pub additions: Option<u64>,
    #[serde(default)]
    pub deletions: Option<u64>,
    #[serde(default)]
    pub changed_files: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RawUser {
    #[serde(default)]
    pub login: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RawLabel {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize)]
struct ListParams {
    state: &'static str,
    sort: &'static str,
    direction: &'static str,
    per_page: u8,
    page: u32,
}

const LIST_PARAMS: ListParams = ListParams {
    state: "all",
    sort: "updated",
    direction: "desc",
    per_page: PAGE_SIZE,
    page: 1,
};

#[derive(Clone)]
pub struct GitHubClient {
    octocrab: Octocrab,
}

impl GitHubClient {
    /// Builds a client, optionally authenticated and optionally pointed at a non-default API.
    pub fn new(token: Option<String>, base_uri: Option<&str>) -> Result<Self> {
        let mut builder = Octocrab::builder().add_retry_config(RetryConfig::None);
        if let Some(token) = token {
            builder = builder.personal_token(token);
        }
        if let Some(base_uri) = base_uri {
            builder = builder.base_uri(base_uri)?;
        }

        Ok(Self {
            octocrab: builder.build()?,
        })
    }

    /// Fetches the most recently updated pull requests of a repository, all states.
    ///
    /// This is one request for the first page only, never retried.
    pub async fn fetch_pull_requests(
        &self,
        repo_id: &RepoId,
    ) -> Result<Vec<RawPullRequest>, DashboardError> {
        let route = format!("/repos/{}/{}/pulls", repo_id.owner, repo_id.repo);

        let page = self
            .octocrab
            .get::<Vec<Value>, _, _>(route, Some(&LIST_PARAMS))
            .await
            .map_err(|e| classify_error(e, repo_id))?;

        Ok(parse_page(page, repo_id))
    }
}

/// Decodes each element on its own so one unusable pull request does not sink the page.
fn parse_page(page: Vec<Value>, repo_id: &RepoId) -> Vec<RawPullRequest> {
    page.into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(pr) => Some(pr),
            Err(e) => {
                tracing::warn!(repo_id = %repo_id, index, error = %e, "Skipping unreadable pull request");
                None
            }
        })
        .collect()
}

/// Maps an octocrab failure onto the dashboard's error taxonomy.
fn classify_error(err: octocrab::Error, repo_id: &RepoId) -> DashboardError {
    match &err {
        octocrab::Error::GitHub { source, .. } => {
            let rate_limited = source.message.to_lowercase().contains("rate limit");
            match source.status_code.as_u16() {
                404 => DashboardError::NotFound(repo_id.clone()),
                401 => DashboardError::Unauthorized,
                429 => DashboardError::RateLimited,
                403 if rate_limited => DashboardError::RateLimited,
                403 => DashboardError::Forbidden(repo_id.clone()),
                _ => DashboardError::Upstream(source.message.clone()),
            }
        }
        // octocrab's own Display appends a backtrace; only the decoder's message is kept.
        octocrab::Error::Serde { source, .. } => DashboardError::Malformed(source.to_string()),
        octocrab::Error::Json { source, .. } => DashboardError::Malformed(source.to_string()),
        _ => DashboardError::Upstream(err.to_string()),
    }
}
