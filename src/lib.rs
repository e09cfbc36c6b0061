pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod github;
pub mod metrics;
pub mod record;
pub mod session;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use config::{AppConfig, RepoId};
use error::DashboardError;
use filter::{author_options, FilterConfig};
use github::GitHubClient;
use metrics::{calculate_metrics, DashboardMetrics};
use record::PullRequestRecord;
use serde::{Deserialize, Serialize};
use session::{Session, SessionStore, SessionSummary};
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Body of a fetch: which repository, and optionally a token for this request only.
#[derive(Deserialize)]
pub struct FetchRequest {
    /// `owner/repo` or a GitHub URL.
    pub repository: String,
    /// Personal access token. Used for the one upstream call and then dropped.
    #[serde(default)]
    pub token: Option<String>,
}

/// Everything the page needs to render one filter configuration.
#[derive(Serialize)]
pub struct DashboardView {
    pub session: SessionSummary,
    pub filter: FilterConfig,
    /// Distinct authors of the unfiltered table, for the author picker.
    pub authors: Vec<String>,
    pub metrics: DashboardMetrics,
    pub rows: Vec<PullRequestRecord>,
}

/// Shared application state accessible to all request handlers.
pub struct AppState {
    /// Session tables, one per fetch.
    pub sessions: SessionStore,
    /// Client used when a request does not supply its own token.
    pub github: GitHubClient,
    /// Application configuration loaded from environment variables.
    pub config: AppConfig,
}

impl AppState {
    /// Initializes the application state, including the shared GitHub client.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let github = GitHubClient::new(
            config.github_token.clone(),
            config.github_api_url.as_deref(),
        )?;
        let sessions = SessionStore::new(&config);
        Ok(Self {
            sessions,
            github,
            config,
        })
    }

    /// Picks the client for one fetch. A non-blank request token gets its own client.
    fn client_for(&self, token: Option<&str>) -> Result<GitHubClient, DashboardError> {
        match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => GitHubClient::new(
                Some(token.to_string()),
                self.config.github_api_url.as_deref(),
            )
            .map_err(|e| DashboardError::Upstream(e.to_string())),
            None => Ok(self.github.clone()),
        }
    }

    /// Fetches one page of pull requests and flattens it into rows.
    async fn load_table(
        &self,
        request: FetchRequest,
    ) -> Result<(RepoId, Vec<PullRequestRecord>), DashboardError> {
        let repo_id = RepoId::parse(&request.repository)?;
        let client = self.client_for(request.token.as_deref())?;

        let raw = client.fetch_pull_requests(&repo_id).await.inspect_err(|e| {
            tracing::warn!(repo_id = %repo_id, error = %e, "Failed to fetch pull requests");
        })?;

        let records = record::transform(raw);
        tracing::info!(repo_id = %repo_id, rows = records.len(), "Fetched pull requests");

        Ok((repo_id, records))
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    let static_dir = &state.config.static_dir;
    let serve_dir = ServeDir::new(static_dir)
        .not_found_service(ServeFile::new(format!("{static_dir}/index.html")));

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/sessions", post(create_session))
        .route(
            "/api/sessions/{id}",
            put(refresh_session).delete(delete_session),
        )
        .route("/api/sessions/{id}/dashboard", get(get_dashboard))
        .route("/api/sessions/{id}/export", get(export_csv))
        .fallback_service(serve_dir)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "pr-dashboard",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FetchRequest>,
) -> Result<(StatusCode, Json<SessionSummary>), DashboardError> {
    let (repo_id, records) = state.load_table(request).await?;
    let session = state
        .sessions
        .put(Session::new(Uuid::new_v4(), repo_id, records))
        .await;

    Ok((StatusCode::CREATED, Json(session.summary())))
}

pub async fn refresh_session(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<FetchRequest>,
) -> Result<Json<SessionSummary>, DashboardError> {
    if state.sessions.get(id).await.is_none() {
        return Err(DashboardError::SessionNotFound(id));
    }

    let (repo_id, records) = state.load_table(request).await?;
    let session = state
        .sessions
        .put(Session::new(id, repo_id, records))
        .await;

    Ok(Json(session.summary()))
}

pub async fn get_dashboard(
    Path(id): Path<Uuid>,
    filter: Result<Query<FilterConfig>, QueryRejection>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardView>, DashboardError> {
    let Query(filter) = filter?;
    filter.validate()?;
    let session = state
        .sessions
        .get(id)
        .await
        .ok_or(DashboardError::SessionNotFound(id))?;

    let rows = filter.apply(&session.records);
    let metrics = calculate_metrics(&rows);
    tracing::debug!(session_id = %id, rows = rows.len(), "Computed dashboard view");

    Ok(Json(DashboardView {
        session: session.summary(),
        authors: author_options(&session.records),
        metrics,
        rows: rows.into_iter().cloned().collect(),
        filter,
    }))
}

pub async fn export_csv(
    Path(id): Path<Uuid>,
    filter: Result<Query<FilterConfig>, QueryRejection>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, DashboardError> {
    let Query(filter) = filter?;
    filter.validate()?;
    let session = state
        .sessions
        .get(id)
        .await
        .ok_or(DashboardError::SessionNotFound(id))?;

    let rows = filter.apply(&session.records);
    let body = export::to_csv_bytes(rows).map_err(|e| DashboardError::Export(e.to_string()))?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export::export_filename(&session.repo)
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

pub async fn delete_session(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, DashboardError> {
    state
        .sessions
        .remove(id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(DashboardError::SessionNotFound(id))
}
