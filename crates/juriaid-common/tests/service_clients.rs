//! Service clients against an in-process axum stub of the orchestrator and auth APIs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use juriaid_common::auth::AuthClient;
use juriaid_common::credentials::{CredentialStore, MemoryCredentialStore, UserProfile};
use juriaid_common::http::{ServiceConfig, ServiceError};
use juriaid_common::orchestrator::{CaseDocument, OrchestratorClient};

const TOKEN: &str = "token-123";

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn config(base_url: &str) -> ServiceConfig {
    ServiceConfig::new(base_url, Duration::from_secs(5)).with_retries(
        2,
        Duration::from_millis(1),
        Duration::from_millis(5),
    )
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] == "secret" {
        Json(json!({ "access_token": TOKEN, "token_type": "bearer" })).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Incorrect email or password" })),
        )
            .into_response()
    }
}

async fn me(headers: HeaderMap) -> Response {
    if bearer(&headers).as_deref() == Some("Bearer token-123") {
        Json(json!({ "email": "lawyer@example.lk", "full_name": "Amara Perera", "id": 1 }))
            .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Could not validate credentials" })),
        )
            .into_response()
    }
}

async fn plan_run(headers: HeaderMap, mut multipart: Multipart) -> Json<Value> {
    let mut file_name = None;
    let mut file_size = 0;
    let mut prompt = None;
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                file_name = field.file_name().map(str::to_string);
                file_size = field.bytes().await.unwrap().len();
            }
            Some("prompt") => prompt = Some(field.text().await.unwrap()),
            _ => {}
        }
    }
    Json(json!({
        "success": true,
        "timestamp": "20250601_080000",
        "results": [{
            "tool": "family_questions",
            "output": {
                "file_name": file_name,
                "file_size": file_size,
                "prompt": prompt,
                "authorization": bearer(&headers),
            }
        }]
    }))
}

async fn analyze_text(Json(body): Json<Value>) -> Response {
    if body["text"].as_str().unwrap_or_default().is_empty() {
        (StatusCode::BAD_REQUEST, Json(json!({ "detail": "Text is required" }))).into_response()
    } else {
        Json(json!({ "summary": "ok" })).into_response()
    }
}

async fn flaky_health(State(hits): State<Arc<AtomicUsize>>) -> Response {
    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
        (StatusCode::SERVICE_UNAVAILABLE, "warming up").into_response()
    } else {
        Json(json!({ "status": "healthy" })).into_response()
    }
}

async fn stub() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/", get(flaky_health))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/api/agent/plan-run", post(plan_run))
        .route("/api/analyze-text", post(analyze_text))
        .with_state(Arc::clone(&hits));
    (spawn(app).await, hits)
}

#[tokio::test]
async fn login_stores_token_and_profile_uses_it() {
    let (base, _) = stub().await;
    let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());
    let auth = AuthClient::new(config(&base), Arc::clone(&store)).unwrap();

    let session = auth.login_session("lawyer@example.lk", "secret").await.unwrap();

    assert_eq!(session.login.access_token.as_deref(), Some(TOKEN));
    assert_eq!(session.user.full_name.as_deref(), Some("Amara Perera"));
    assert!(auth.is_authenticated().await);
    assert_eq!(store.profile().await, Some(session.user));
}

#[tokio::test]
async fn failed_login_reports_detail_and_stores_nothing() {
    let (base, _) = stub().await;
    let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());
    let auth = AuthClient::new(config(&base), Arc::clone(&store)).unwrap();

    let err = auth.login("lawyer@example.lk", "wrong").await.unwrap_err();

    assert_eq!(err.user_message("Login failed"), "Incorrect email or password");
    assert_eq!(auth.token().await, None);
}

#[tokio::test]
async fn unauthorized_reply_clears_credentials() {
    let (base, _) = stub().await;
    let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());
    store.set_token("expired").await.unwrap();
    store
        .set_profile(&UserProfile {
            email: Some("old@example.lk".to_string()),
            ..UserProfile::default()
        })
        .await
        .unwrap();
    let auth = AuthClient::new(config(&base), Arc::clone(&store)).unwrap();

    let err = auth.get_profile().await.unwrap_err();

    assert!(
        matches!(&err, ServiceError::Unauthorized { message } if message == "Could not validate credentials"),
        "{err:?}"
    );
    assert_eq!(store.token().await, None);
    assert_eq!(store.profile().await, None);
}

#[tokio::test]
async fn plan_run_uploads_document_and_prompt_with_bearer() {
    let (base, _) = stub().await;
    let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentialStore::new());
    store.set_token(TOKEN).await.unwrap();
    let orchestrator = OrchestratorClient::new(config(&base), store).unwrap();

    let document = CaseDocument::new(Some("plaint.pdf"), None, b"%PDF-1.4".to_vec());
    let reply = orchestrator
        .agent_plan_run(&document, "Generate client intake questions")
        .await
        .unwrap();

    let output = &reply["results"][0]["output"];
    assert_eq!(output["file_name"], "plaint.pdf");
    assert_eq!(output["file_size"], 8);
    assert_eq!(output["prompt"], "Generate client intake questions");
    assert_eq!(output["authorization"], "Bearer token-123");
}

#[tokio::test]
async fn analyze_text_surfaces_detail() {
    let (base, _) = stub().await;
    let orchestrator =
        OrchestratorClient::new(config(&base), Arc::new(MemoryCredentialStore::new())).unwrap();

    let reply = orchestrator.analyze_text("Husband left in 2019").await.unwrap();
    assert_eq!(reply, json!({ "summary": "ok" }));

    let err = orchestrator.analyze_text("").await.unwrap_err();
    assert!(
        matches!(&err, ServiceError::Upstream { status, message } if *status == StatusCode::BAD_REQUEST && message == "Text is required"),
        "{err:?}"
    );
}

#[tokio::test]
async fn health_check_retries_transient_failure() {
    let (base, hits) = stub().await;
    let orchestrator =
        OrchestratorClient::new(config(&base), Arc::new(MemoryCredentialStore::new())).unwrap();

    let reply = orchestrator.health_check().await.unwrap();

    assert_eq!(reply, json!({ "status": "healthy" }));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}
