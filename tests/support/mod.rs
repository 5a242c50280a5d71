#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use scanboard::auth::SharedTokenProvider;
use scanboard::config::ClientConfig;
use scanboard::notify::MemoryNotifier;
use scanboard::ScanboardClient;

pub const CREATED_AT: &str = "2024-01-15T10:30:00Z";

#[derive(Debug, Clone)]
pub struct Hit {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
}

/// Shared state of the fake API.
#[derive(Clone, Default)]
pub struct FakeApi {
    hits: Arc<Mutex<Vec<Hit>>>,
    /// Reads of a scan that report `running` before it turns `completed`.
    running_reads: Arc<AtomicUsize>,
    /// Reads of the `flaky` scan; only the first one succeeds.
    flaky_reads: Arc<AtomicUsize>,
}

impl FakeApi {
    pub fn with_running_reads(reads: usize) -> Self {
        let api = Self::default();
        api.running_reads.store(reads, Ordering::SeqCst);
        api
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.hits
            .lock()
            .iter()
            .filter(|h| h.method == method && h.path == path)
            .count()
    }

    pub fn total(&self) -> usize {
        self.hits.lock().len()
    }
}

pub struct TestServer {
    pub base_url: String,
    pub api: FakeApi,
    handle: JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn spawn_server(api: FakeApi) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = router(api.clone());
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    TestServer {
        base_url: format!("http://{}", addr),
        api,
        handle,
    }
}

/// Base URL of a port nothing is listening on.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn client(base_url: &str, tokens: SharedTokenProvider) -> (ScanboardClient, Arc<MemoryNotifier>) {
    client_with(ClientConfig::with_base_url(base_url), tokens)
}

pub fn client_with(config: ClientConfig, tokens: SharedTokenProvider) -> (ScanboardClient, Arc<MemoryNotifier>) {
    let notifier = Arc::new(MemoryNotifier::new());
    let client = ScanboardClient::new(config, tokens, notifier.clone()).unwrap();
    (client, notifier)
}

fn router(api: FakeApi) -> Router {
    Router::new()
        .route("/api/projects", get(list_projects).post(create_project))
        .route("/api/projects/:id/targets", get(list_targets).post(create_target))
        .route("/api/projects/:id/scans", get(list_scans))
        .route("/api/scans", post(create_scan))
        .route("/api/scans/:id", get(get_scan))
        .route("/api/scans/:id/findings", get(list_findings))
        .route("/api/scans/:id/reports", get(list_reports).post(generate_report))
        .layer(middleware::from_fn_with_state(api.clone(), record))
        .with_state(api)
}

async fn record(State(api): State<FakeApi>, req: Request, next: Next) -> Response {
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    api.hits.lock().push(Hit {
        method: req.method().to_string(),
        path: req.uri().path().to_string(),
        authorization,
    });
    next.run(req).await
}

pub fn project_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": null,
        "createdAt": CREATED_AT,
        "updatedAt": CREATED_AT,
    })
}

pub fn target_json(id: &str, project_id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "projectId": project_id,
        "name": name,
        "url": "https://example.com",
        "type": "web",
        "status": "active",
        "createdAt": CREATED_AT,
        "updatedAt": CREATED_AT,
    })
}

pub fn scan_json(id: &str, project_id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "projectId": project_id,
        "targetId": "t1",
        "status": status,
        "severity": "high",
        "createdAt": CREATED_AT,
    })
}

async fn list_projects() -> Json<Value> {
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    Json(json!([project_json("p1", "Acme"), project_json("p2", "Globex")]))
}

async fn create_project(Json(body): Json<Value>) -> impl IntoResponse {
    let name = body["name"].as_str().unwrap_or_default();
    (StatusCode::CREATED, Json(project_json("p3", name)))
}

async fn list_targets(Path(project_id): Path<String>) -> Json<Value> {
    let id = format!("{}-t1", project_id);
    Json(json!([target_json(&id, &project_id, "main site")]))
}

async fn create_target(Path(project_id): Path<String>, Json(body): Json<Value>) -> Response {
    if body["projectId"] != json!(project_id) || body["type"].is_null() {
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"message": "bad target"}))).into_response();
    }
    let name = body["name"].as_str().unwrap_or_default();
    (StatusCode::CREATED, Json(target_json("t9", &project_id, name))).into_response()
}

async fn list_scans(Path(project_id): Path<String>) -> Json<Value> {
    Json(json!([
        scan_json("s1", &project_id, "running"),
        scan_json("s2", &project_id, "completed"),
    ]))
}

async fn create_scan(Json(body): Json<Value>) -> Response {
    let Some(project_id) = body["projectId"].as_str() else {
        return (StatusCode::BAD_REQUEST, Json(json!({"message": "projectId missing"}))).into_response();
    };
    (StatusCode::CREATED, Json(scan_json("s9", project_id, "pending"))).into_response()
}

async fn get_scan(State(api): State<FakeApi>, Path(scan_id): Path<String>) -> Response {
    match scan_id.as_str() {
        "missing" => {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            (StatusCode::NOT_FOUND, Json(json!({"message": "not found"}))).into_response()
        }
        "garbled" => (StatusCode::OK, "definitely not json").into_response(),
        "broken" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "flaky" => {
            if api.flaky_reads.fetch_add(1, Ordering::SeqCst) == 0 {
                Json(scan_json("flaky", "p1", "running")).into_response()
            } else {
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
        "queued" => Json(scan_json("queued", "p1", "queued")).into_response(),
        _ => {
            let remaining = api
                .running_reads
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            let status = if remaining { "running" } else { "completed" };
            Json(scan_json(&scan_id, "p1", status)).into_response()
        }
    }
}

async fn list_findings(Path(scan_id): Path<String>) -> Json<Value> {
    Json(json!([
        {
            "id": "f1",
            "scanId": scan_id,
            "title": "SQL injection",
            "description": "login form",
            "severity": "critical",
            "type": "strix",
            "validated": true,
            "createdAt": CREATED_AT,
        },
        {
            "id": "f2",
            "scanId": scan_id,
            "title": "Outdated TLS",
            "description": "",
            "severity": "informational",
            "type": "zap",
            "validated": false,
            "createdAt": CREATED_AT,
        },
    ]))
}

async fn list_reports(Path(scan_id): Path<String>) -> Json<Value> {
    Json(json!([{
        "id": "r1",
        "scanId": scan_id,
        "format": "pdf",
        "url": "https://reports.example.com/r1.pdf",
        "createdAt": CREATED_AT,
    }]))
}

async fn generate_report(Path(scan_id): Path<String>, Json(body): Json<Value>) -> impl IntoResponse {
    let format = body["format"].as_str().unwrap_or("pdf").to_string();
    (
        StatusCode::CREATED,
        Json(json!({
            "id": "r2",
            "scanId": scan_id,
            "format": format,
            "url": format!("https://reports.example.com/r2.{}", format),
            "createdAt": CREATED_AT,
        })),
    )
}
