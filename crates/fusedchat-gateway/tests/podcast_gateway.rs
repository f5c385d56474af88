//! End-to-end tests for the podcast gateway routes.
//!
//! The AI service is replaced by an in-process axum server that records
//! every request it receives, so tests can assert both what the gateway
//! answers and whether (and with what) it contacted the service.

use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use fusedchat_gateway::http::{build_router, AppState};
use fusedchat_gateway::users::{AccessRequest, AccessStatus, JsonUserStore, UserRecord};
use fusedchat_proto::config::Config;
use serde_json::{json, Value};
use tower::ServiceExt;

type Calls = Arc<Mutex<Vec<(String, Value)>>>;

struct MockAi {
    url: String,
    calls: Calls,
}

impl MockAi {
    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

async fn spawn_mock_ai() -> MockAi {
    async fn generate(State(calls): State<Calls>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        let document = body["document_name"].as_str().unwrap_or_default().to_string();
        calls.lock().unwrap().push(("generate_podcast".into(), body));
        match document.as_str() {
            "Quota.pdf" => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({"error": "Gemini quota exceeded", "status": "error"})),
            ),
            "Broken.pdf" => (StatusCode::BAD_GATEWAY, Json(json!({}))),
            _ => (
                StatusCode::ACCEPTED,
                Json(json!({"status": "queued", "task_id": "task-123"})),
            ),
        }
    }

    async fn status(State(calls): State<Calls>, UrlPath(id): UrlPath<String>) -> (StatusCode, Json<Value>) {
        calls.lock().unwrap().push(("podcast_status".into(), json!(id)));
        if id == "task-123" {
            (StatusCode::OK, Json(json!({"status": "processing"})))
        } else {
            (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "Task not found", "status": "error"})),
            )
        }
    }

    let calls: Calls = Arc::default();
    let app = Router::new()
        .route("/generate_podcast", post(generate))
        .route("/podcast_status/:id", get(status))
        .with_state(calls.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockAi {
        url: format!("http://{}", addr),
        calls,
    }
}

fn user(id: &str, username: &str, gemini: Option<&str>, access: Option<AccessStatus>) -> UserRecord {
    UserRecord {
        id: id.into(),
        username: username.into(),
        role: None,
        gemini_api_key: gemini.map(str::to_string),
        grok_api_key: None,
        api_key_access_request: access.map(|status| AccessRequest { status }),
    }
}

fn gateway(ai_url: Option<&str>, assets: &Path) -> Router {
    let mut config = Config::default();
    config.ai_service.url = ai_url.map(str::to_string);
    config.storage.assets_dir = assets.to_path_buf();
    config.operator.gemini_api_key = Some("operator-gemini".into());

    let users = JsonUserStore::from_users([
        user("u-alice", "alice", Some("alice-gemini"), None),
        user("u-carol", "carol", Some("carol-gemini"), Some(AccessStatus::Approved)),
        user("u-dave", "dave", None, Some(AccessStatus::Pending)),
    ]);
    build_router(AppState::from_config(&config, Arc::new(users)), "http://localhost:3000")
}

fn assets_with(files: &[(&str, &str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (user, category, name) in files {
        let folder = dir.path().join(user).join(category);
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join(name), b"%PDF-1.4").unwrap();
    }
    dir
}

fn generate_request(user_id: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/podcast/generate")
        .header("content-type", "application/json");
    if let Some(id) = user_id {
        builder = builder.header("x-user-id", id);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn status_request(task_id: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/api/podcast/status/{}", task_id))
        .header("x-user-id", "u-alice")
        .body(Body::empty())
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_generate_relays_task_id_from_service() {
    let ai = spawn_mock_ai().await;
    let assets = assets_with(&[("alice", "docs", "x.pdf")]);

    let (status, body) = send(
        gateway(Some(&ai.url), assets.path()),
        generate_request(
            Some("u-alice"),
            json!({"serverFilename": "x.pdf", "documentName": "Notes.pdf"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["task_id"], "task-123");

    let calls = ai.calls();
    assert_eq!(calls.len(), 1);
    let (route, payload) = &calls[0];
    assert_eq!(route, "generate_podcast");
    assert_eq!(payload["document_name"], "Notes.pdf");
    assert!(payload["file_path"]
        .as_str()
        .unwrap()
        .ends_with("alice/docs/x.pdf"));
    assert_eq!(payload["api_keys"]["gemini"], "alice-gemini");
}

#[tokio::test]
async fn test_missing_fields_never_reach_service() {
    let ai = spawn_mock_ai().await;
    let assets = assets_with(&[("alice", "docs", "x.pdf")]);

    for body in [
        json!({"serverFilename": "x.pdf"}),
        json!({"documentName": "Notes.pdf"}),
        json!({"serverFilename": "", "documentName": "Notes.pdf"}),
        json!({}),
    ] {
        let (status, reply) = send(
            gateway(Some(&ai.url), assets.path()),
            generate_request(Some("u-alice"), body),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply["message"], "Missing required fields.");
    }
    assert!(ai.calls().is_empty());
}

#[tokio::test]
async fn test_unconfigured_service_is_503() {
    let assets = assets_with(&[("alice", "docs", "x.pdf")]);

    let (status, body) = send(
        gateway(None, assets.path()),
        generate_request(
            Some("u-alice"),
            json!({"serverFilename": "x.pdf", "documentName": "Notes.pdf"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({"message": "AI Service is unavailable."}));

    let (status, body) = send(gateway(None, assets.path()), status_request("task-123")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "AI Service is unavailable.");
}

#[tokio::test]
async fn test_absent_file_is_404_naming_document() {
    let ai = spawn_mock_ai().await;
    let assets = assets_with(&[]);

    let (status, body) = send(
        gateway(Some(&ai.url), assets.path()),
        generate_request(
            Some("u-alice"),
            json!({"serverFilename": "missing.pdf", "documentName": "Notes.pdf"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap().contains("Notes.pdf"));
    assert!(ai.calls().is_empty());
}

#[tokio::test]
async fn test_traversal_filename_is_rejected() {
    let ai = spawn_mock_ai().await;
    let assets = assets_with(&[("alice", "docs", "x.pdf")]);

    let (status, body) = send(
        gateway(Some(&ai.url), assets.path()),
        generate_request(
            Some("u-carol"),
            json!({"serverFilename": "../alice/docs/x.pdf", "documentName": "Notes.pdf"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid file name.");
    assert!(ai.calls().is_empty());
}

#[tokio::test]
async fn test_approved_user_sends_operator_key_only() {
    let ai = spawn_mock_ai().await;
    let assets = assets_with(&[("carol", "docs", "c.pdf")]);

    let (status, _) = send(
        gateway(Some(&ai.url), assets.path()),
        generate_request(
            Some("u-carol"),
            json!({"serverFilename": "c.pdf", "documentName": "Carol.pdf"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let calls = ai.calls();
    let payload = &calls[0].1;
    assert_eq!(payload["api_keys"]["gemini"], "operator-gemini");
    assert!(!payload.to_string().contains("carol-gemini"));
}

#[tokio::test]
async fn test_user_without_key_is_400() {
    let ai = spawn_mock_ai().await;
    let assets = assets_with(&[("dave", "docs", "d.pdf")]);

    let (status, body) = send(
        gateway(Some(&ai.url), assets.path()),
        generate_request(
            Some("u-dave"),
            json!({"serverFilename": "d.pdf", "documentName": "Dave.pdf"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "A Gemini API key is required for podcast scripting."
    );
    assert!(ai.calls().is_empty());
}

#[tokio::test]
async fn test_missing_or_unknown_user_is_401() {
    let assets = assets_with(&[]);
    let body = json!({"serverFilename": "x.pdf", "documentName": "Notes.pdf"});

    let (status, _) = send(gateway(None, assets.path()), generate_request(None, body.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, reply) = send(
        gateway(None, assets.path()),
        generate_request(Some("u-nobody"), body),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(reply["message"].is_string());
}

#[tokio::test]
async fn test_status_is_passthrough() {
    let ai = spawn_mock_ai().await;
    let assets = assets_with(&[]);

    let (status, body) = send(gateway(Some(&ai.url), assets.path()), status_request("task-123")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "processing"}));

    let (status, body) = send(gateway(Some(&ai.url), assets.path()), status_request("nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"message": "Task not found"}));
}

#[tokio::test]
async fn test_unreachable_service_is_500() {
    // Grab a free port, then close it so nothing is listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let assets = assets_with(&[]);
    let (status, body) = send(gateway(Some(&url), assets.path()), status_request("task-123")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Failed to get podcast status.");
}

#[tokio::test]
async fn test_generate_relays_upstream_error() {
    let ai = spawn_mock_ai().await;
    let assets = assets_with(&[("alice", "docs", "x.pdf")]);

    let (status, body) = send(
        gateway(Some(&ai.url), assets.path()),
        generate_request(
            Some("u-alice"),
            json!({"serverFilename": "x.pdf", "documentName": "Quota.pdf"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, json!({"message": "Gemini quota exceeded"}));

    // No `error` in the upstream body: status kept, generic message.
    let (status, body) = send(
        gateway(Some(&ai.url), assets.path()),
        generate_request(
            Some("u-alice"),
            json!({"serverFilename": "x.pdf", "documentName": "Broken.pdf"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["message"], "Failed to start podcast generation.");
    assert_eq!(ai.calls().len(), 2);
}

#[tokio::test]
async fn test_generate_with_unreachable_service_is_500() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let assets = assets_with(&[("alice", "docs", "x.pdf")]);
    let (status, body) = send(
        gateway(Some(&url), assets.path()),
        generate_request(
            Some("u-alice"),
            json!({"serverFilename": "x.pdf", "documentName": "Notes.pdf"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"message": "Failed to start podcast generation."}));
}

#[tokio::test]
async fn test_root_route() {
    let assets = assets_with(&[]);
    let response = gateway(None, assets.path())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"Chatbot Backend API is running...");
}
