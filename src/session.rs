//! In-memory session tables.
//!
//! A session holds the unfiltered rows of one fetch. Refetching replaces the table
//! wholesale; nothing is written to disk and everything is gone on restart.

use crate::config::{AppConfig, RepoId};
use crate::record::PullRequestRecord;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// The table produced by one fetch.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub repo: RepoId,
    pub fetched_at: DateTime<Utc>,
    pub records: Vec<PullRequestRecord>,
}

impl Session {
    pub fn new(id: Uuid, repo: RepoId, records: Vec<PullRequestRecord>) -> Self {
        Self {
            id,
            repo,
            fetched_at: Utc::now(),
            records,
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id,
            repo: self.repo.clone(),
            fetched_at: self.fetched_at,
            total: self.records.len(),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub repo: RepoId,
    pub fetched_at: DateTime<Utc>,
    pub total: usize,
}

#[derive(Clone)]
pub struct SessionStore {
    cache: Cache<Uuid, Arc<Session>>,
}

impl SessionStore {
    /// Sessions expire after sitting idle for the configured TTL.
    pub fn new(config: &AppConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.session_max_capacity)
            .time_to_idle(config.session_ttl())
            .build();

        Self { cache }
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        self.cache.get(&id).await
    }

    /// Stores a session, discarding any previous table under the same id.
    pub async fn put(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        self.cache.insert(session.id, session.clone()).await;
        tracing::debug!(session_id = %session.id, repo = %session.repo, rows = session.records.len(), "Stored session table");
        session
    }

    pub async fn remove(&self, id: Uuid) -> Option<Arc<Session>> {
        let removed = self.cache.remove(&id).await;
        if removed.is_some() {
            tracing::debug!(session_id = %id, "Dropped session");
        }
        removed
    }
}
