//! Error taxonomy surfaced to dashboard users.
//!
//! Every failure is reported back as a message; nothing here is retried.

use crate::config::RepoId;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("'{0}' is not a repository; expected owner/repo or https://github.com/owner/repo")]
    InvalidRepoFormat(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// The repository is missing, or private and the token (if any) lacks access.
    #[error("repository '{0}' not found or not accessible with the given token")]
    NotFound(RepoId),

    #[error("GitHub rejected the token; check that it is valid and not expired")]
    Unauthorized,

    #[error("access to '{0}' is forbidden; the token may lack permissions")]
    Forbidden(RepoId),

    #[error("GitHub API rate limit exceeded; supply a token or wait for the quota to reset")]
    RateLimited,

    #[error("unexpected response from GitHub: {0}")]
    Malformed(String),

    #[error("GitHub request failed: {0}")]
    Upstream(String),

    #[error("session {0} does not exist or has expired")]
    SessionNotFound(Uuid),

    #[error("failed to build CSV export: {0}")]
    Export(String),
}

impl DashboardError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRepoFormat(_) => "invalid_repo_format",
            Self::InvalidFilter(_) => "invalid_filter",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::RateLimited => "rate_limited",
            Self::Malformed(_) => "malformed",
            Self::Upstream(_) => "upstream",
            Self::SessionNotFound(_) => "session_not_found",
            Self::Export(_) => "export",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRepoFormat(_) | Self::InvalidFilter(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) | Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Malformed(_) | Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QueryRejection> for DashboardError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidFilter(rejection.body_text())
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}
