//! Local HTTP control surface: a single page plus a small JSON API.

mod error;

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    archive::{AnalysisRecord, ResultsArchive},
    blocklist::Blocklist,
    error::DeepWorkError,
    session::{ModeRequest, SessionController, SessionSnapshot},
};

const INDEX_HTML: &str = include_str!("index.html");
const DEFAULT_ANALYSES_LIMIT: usize = 20;
const MAX_ANALYSES_LIMIT: usize = 500;

pub struct AppState {
    pub controller: SessionController,
    pub archive: Option<ResultsArchive>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/mode", post(set_mode))
        .route("/api/task", post(set_task))
        .route("/api/analyses", get(analyses))
        .route("/api/blocklist", get(blocklist))
        .with_state(Arc::new(state))
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn status(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.controller.snapshot().await)
}

async fn set_mode(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ModeRequest>,
) -> Result<Json<SessionSnapshot>, DeepWorkError> {
    state.controller.set_mode(request).await.map(Json)
}

#[derive(Deserialize)]
struct TaskPayload {
    task: String,
}

async fn set_task(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TaskPayload>,
) -> Json<SessionSnapshot> {
    Json(state.controller.set_task(&payload.task).await)
}

#[derive(Deserialize)]
struct AnalysesQuery {
    limit: Option<usize>,
}

async fn analyses(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalysesQuery>,
) -> Result<Json<Vec<AnalysisRecord>>, DeepWorkError> {
    let Some(archive) = &state.archive else {
        return Ok(Json(Vec::new()));
    };

    let limit = query
        .limit
        .unwrap_or(DEFAULT_ANALYSES_LIMIT)
        .min(MAX_ANALYSES_LIMIT);
    archive
        .recent_analyses(limit)
        .await
        .map(Json)
        .map_err(|err| DeepWorkError::external("archive", &err))
}

async fn blocklist(State(state): State<Arc<AppState>>) -> Json<Blocklist> {
    Json(state.controller.blocklist().await)
}

#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use chrono::Utc;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        blocking::{hosts::DEFAULT_REDIRECT_IP, BlockingGate, HostsFile},
        monitor::{testing::*, MonitorController, MonitorSettings},
        session::ConfirmationGate,
    };

    const PHRASE: &str = "stay focused";

    fn app(dir: &tempfile::TempDir, archive: Option<ResultsArchive>) -> Router {
        let hosts = dir.path().join("hosts");
        fs::write(&hosts, "127.0.0.1 localhost\n").unwrap();
        let gate = BlockingGate::new(
            HostsFile::new(hosts, DEFAULT_REDIRECT_IP).with_dns_flush(false),
            Blocklist {
                websites: vec!["reddit.com".into()],
                processes: vec!["not-a-real-app-7f3.exe".into()],
            },
            Duration::from_secs(3600),
        );
        let (speaker, _) = RecordingSpeaker::new();
        let monitor = MonitorController::new(
            deps(FakeSource::new(), FakeModel::replying("{}"), speaker, None),
            MonitorSettings {
                capture_interval: Duration::from_secs(3600),
                ..MonitorSettings::default()
            },
        );
        let controller =
            SessionController::new(gate, monitor, ConfirmationGate::new(PHRASE), "ship it");
        router(AppState {
            controller,
            archive,
        })
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn serves_page_and_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir, None);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (status, body) = call(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn mode_changes_go_through_the_phrase() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir, None);

        let (status, body) = call(&app, "POST", "/api/mode", Some(json!({"mode": "on"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "on");
        assert_eq!(body["task"], "ship it");

        let (status, body) = call(
            &app,
            "POST",
            "/api/mode",
            Some(json!({"mode": "off", "confirmation": "nah"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "INVALID_CONFIRMATION");

        let (status, body) = call(
            &app,
            "POST",
            "/api/mode",
            Some(json!({"mode": "break", "confirmation": PHRASE, "minutes": -1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_BREAK_DURATION");

        let (status, body) = call(
            &app,
            "POST",
            "/api/mode",
            Some(json!({"mode": "break", "confirmation": PHRASE, "minutes": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "break");
        assert!(body["breakRemainingMs"].as_u64().unwrap() <= 120_000);

        let (_, body) = call(&app, "GET", "/api/status", None).await;
        assert_eq!(body["mode"], "break");
    }

    #[tokio::test]
    async fn hosts_failure_is_a_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir, None);
        fs::remove_file(dir.path().join("hosts")).unwrap();

        let (status, body) = call(&app, "POST", "/api/mode", Some(json!({"mode": "on"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "HOSTS_FILE");
    }

    #[tokio::test]
    async fn task_and_blocklist_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir, None);

        let (status, body) =
            call(&app, "POST", "/api/task", Some(json!({"task": "review PRs"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["task"], "review PRs");

        let (_, body) = call(&app, "GET", "/api/blocklist", None).await;
        assert_eq!(body["websites"], json!(["reddit.com"]));
        assert_eq!(body["processes"], json!(["not-a-real-app-7f3.exe"]));
    }

    #[tokio::test]
    async fn analyses_come_from_the_archive() {
        let dir = tempfile::tempdir().unwrap();
        let (_, body) = call(&app(&dir, None), "GET", "/api/analyses", None).await;
        assert_eq!(body, json!([]));

        let archive = ResultsArchive::open(dir.path().join("results")).unwrap();
        for id in ["a", "b", "c"] {
            archive
                .insert_analysis(&AnalysisRecord {
                    id: id.into(),
                    session_id: "s".into(),
                    task: "ship it".into(),
                    analyzed_at: Utc::now(),
                    productive: true,
                    reason: "Nice work!".into(),
                    raw_response: "{}".into(),
                    frame_count: 3,
                    change_score: None,
                })
                .await
                .unwrap();
        }

        let (status, body) = call(&app(&dir, Some(archive)), "GET", "/api/analyses?limit=2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[0]["reason"], "Nice work!");
    }
}
