//! Application configuration and repository identifier parsing.
//!
//! This module handles loading configuration settings from the environment (e.g., .env file).
//! It defines the `AppConfig` struct which governs the listen port, the GitHub endpoint,
//! session lifetimes and where the dashboard page is served from.

use crate::error::DashboardError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration as StdDuration;
use url::Url;

/// A unique identifier for a GitHub repository.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    /// The owner of the repository (e.g., "octocat").
    pub owner: String,
    /// The name of the repository (e.g., "Hello-World").
    pub repo: String,
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl RepoId {
    /// Parses a repository identifier given either as `owner/repo` or as a GitHub URL.
    ///
    /// Accepted forms:
    /// * `owner/repo`
    /// * `github.com/owner/repo`
    /// * `https://github.com/owner/repo`, optionally followed by more path segments
    ///
    /// A trailing slash and a `.git` suffix are ignored.
    pub fn parse(input: &str) -> Result<Self, DashboardError> {
        let input = input.trim();
        let invalid = || DashboardError::InvalidRepoFormat(input.to_string());

        let (owner, repo) = if input.starts_with("http://") || input.starts_with("https://") {
            let url = Url::parse(input).map_err(|_| invalid())?;
            match url.host_str() {
                Some("github.com") | Some("www.github.com") => {}
                _ => return Err(invalid()),
            }
            let mut segments = url
                .path_segments()
                .ok_or_else(invalid)?
                .filter(|s| !s.is_empty());
            let owner = segments.next().ok_or_else(invalid)?;
            let repo = segments.next().ok_or_else(invalid)?;
            (owner.to_string(), repo.to_string())
        } else {
            let path = input
                .strip_prefix("github.com/")
                .or_else(|| input.strip_prefix("www.github.com/"))
                .unwrap_or(input)
                .trim_end_matches('/');
            let parts: Vec<&str> = path.split('/').collect();
            if parts.len() != 2 {
                return Err(invalid());
            }
            (parts[0].trim().to_string(), parts[1].trim().to_string())
        };

        let repo = repo.strip_suffix(".git").map(str::to_string).unwrap_or(repo);

        if !is_valid_segment(&owner) || !is_valid_segment(&repo) {
            return Err(invalid());
        }

        Ok(Self { owner, repo })
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Optional GitHub Personal Access Token used when a request does not bring its own.
    pub github_token: Option<String>,

    /// Optional override of the GitHub API base URI (GitHub Enterprise, local stand-ins).
    pub github_api_url: Option<String>,

    /// Idle time to live of a session table in seconds.
    #[serde(default = "default_session_ttl_seconds")]
    pub session_ttl_seconds: u64,

    /// Maximum number of live sessions kept in memory.
    #[serde(default = "default_session_max_capacity")]
    pub session_max_capacity: u64,

    /// Directory the dashboard page is served from.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

fn default_port() -> u16 {
    3000
}

fn default_session_ttl_seconds() -> u64 {
    3600
}

fn default_session_max_capacity() -> u64 {
    1000
}

fn default_static_dir() -> String {
    "dist".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            github_token: None,
            github_api_url: None,
            session_ttl_seconds: default_session_ttl_seconds(),
            session_max_capacity: default_session_max_capacity(),
            static_dir: default_static_dir(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn session_ttl(&self) -> StdDuration {
        StdDuration::from_secs(self.session_ttl_seconds)
    }
}
