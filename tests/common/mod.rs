//! A stand-in for the GitHub pulls endpoint, served on an ephemeral local port.
#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use pr_dashboard::{config::AppConfig, create_app, AppState};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt; // for `oneshot`

/// What the stand-in saw: one entry per request.
#[derive(Clone, Default)]
pub struct Seen {
    pub queries: Arc<Mutex<Vec<String>>>,
    pub authorization: Arc<Mutex<Vec<Option<String>>>>,
}

impl Seen {
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    pub fn authorization(&self) -> Vec<Option<String>> {
        self.authorization.lock().unwrap().clone()
    }
}

/// Starts the stand-in and returns its base URI.
///
/// The repository name picks the behavior: `empty` and `Hello-World` have no pull
/// requests, `missing` is a 404, `limited` is an exhausted quota reported as 403,
/// `throttled` is a 429, `forbidden` is a plain 403, `revoked` is a 401, `boom` is
/// a 500, `garbled` answers with an object instead of a list, and `patchy` mixes
/// one pull request without `created_at` into [`fixture_pulls`]. Anything else
/// returns [`fixture_pulls`].
pub async fn spawn_github() -> (String, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route("/repos/{owner}/{repo}/pulls", get(list_pulls))
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), seen)
}

async fn list_pulls(
    State(seen): State<Seen>,
    Path((owner, repo)): Path<(String, String)>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    seen.queries.lock().unwrap().push(query.unwrap_or_default());
    seen.authorization.lock().unwrap().push(
        headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    );

    match repo.as_str() {
        "empty" | "Hello-World" => Json(json!([])).into_response(),
        "missing" => github_error(StatusCode::NOT_FOUND, "Not Found"),
        "limited" => github_error(
            StatusCode::FORBIDDEN,
            "API rate limit exceeded for 127.0.0.1.",
        ),
        "throttled" => github_error(StatusCode::TOO_MANY_REQUESTS, "Too many requests"),
        "revoked" => github_error(StatusCode::UNAUTHORIZED, "Bad credentials"),
        "boom" => github_error(StatusCode::INTERNAL_SERVER_ERROR, "Server Error"),
        "patchy" => {
            let mut pulls = fixture_pulls(&owner, &repo);
            if let Value::Array(items) = &mut pulls {
                items.insert(1, json!({ "number": 9, "title": "No timestamp" }));
            }
            Json(pulls).into_response()
        }
        "forbidden" => github_error(
            StatusCode::FORBIDDEN,
            "Resource not accessible by personal access token",
        ),
        "garbled" => Json(json!({ "unexpected": "shape" })).into_response(),
        _ => Json(fixture_pulls(&owner, &repo)).into_response(),
    }
}

fn github_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({
            "message": message,
            "documentation_url": "https://docs.github.com/rest",
        })),
    )
        .into_response()
}

/// Three pull requests: #3 open (alice), #2 merged after 2 days (bob),
/// #1 closed unmerged after 5 days (alice).
pub fn fixture_pulls(owner: &str, repo: &str) -> Value {
    let url = |n: u64| format!("https://github.com/{owner}/{repo}/pull/{n}");
    json!([
        {
            "number": 3,
            "title": "Add dark mode",
            "html_url": url(3),
            "state": "open",
            "created_at": "2024-03-10T09:00:00Z",
            "updated_at": "2024-03-12T09:00:00Z",
            "closed_at": null,
            "merged_at": null,
            "user": { "login": "alice" },
            "labels": [{ "name": "enhancement" }],
            "assignees": [],
            "body": "Implements Ab#1234567"
        },
        {
            "number": 2,
            "title": "Fix crash on start",
            "html_url": url(2),
            "state": "closed",
            "created_at": "2024-02-01T12:00:00Z",
            "updated_at": "2024-02-03T12:00:00Z",
            "closed_at": "2024-02-03T12:00:00Z",
            "merged_at": "2024-02-03T12:00:00Z",
            "user": { "login": "bob" },
            "labels": [{ "name": "bug" }],
            "assignees": [{ "login": "alice" }],
            "body": null
        },
        {
            "number": 1,
            "title": "Experiment",
            "html_url": url(1),
            "state": "closed",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-06T00:00:00Z",
            "closed_at": "2024-01-06T00:00:00Z",
            "merged_at": null,
            "user": { "login": "alice" },
            "labels": [],
            "assignees": null
        }
    ])
}

pub fn test_config(github_api_url: &str) -> AppConfig {
    AppConfig {
        github_api_url: Some(github_api_url.to_string()),
        session_ttl_seconds: 60,
        session_max_capacity: 100,
        ..Default::default()
    }
}

pub async fn test_app() -> (Router, Seen) {
    let (base, seen) = spawn_github().await;
    let state = Arc::new(AppState::new(test_config(&base)).expect("Failed to create state"));
    (create_app(state), seen)
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Creates a session for `repository` and returns its id.
pub async fn create_session(app: &Router, repository: &str) -> String {
    let (status, _, body) = send(
        app,
        json_request("POST", "/api/sessions", json!({ "repository": repository })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let body: Value = serde_json::from_slice(&body).unwrap();
    body["session_id"].as_str().unwrap().to_string()
}
