//! REST API Server for the loan origination orchestrator
//!
//! Exposes turn handling, income-proof upload and sanction letter lookup
//! over HTTP for the chat frontend

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::Orchestrator;
use crate::error::OriginationError;
use crate::models::InputType;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub session_id: String,
    pub filename: String,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub session_id: String,
    pub status: String,
    pub requires_input: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<InputType>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

type ApiResult = (StatusCode, Json<ApiResponse>);

fn failure(status: StatusCode, message: String) -> ApiResult {
    (status, Json(ApiResponse::error(message)))
}

fn status_for(error: &OriginationError) -> StatusCode {
    match error {
        OriginationError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(State(state): State<ApiState>, Json(req): Json<ChatRequest>) -> ApiResult {
    if req.message.trim().is_empty() {
        return failure(StatusCode::BAD_REQUEST, "Message is required".into());
    }

    let session_id = req
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    match state.orchestrator.handle_turn(&session_id, &req.message).await {
        Ok(turn) => (
            StatusCode::OK,
            Json(ApiResponse::success(ChatReply {
                response: turn.message,
                session_id,
                status: turn.phase.to_string(),
                requires_input: turn.requires_input,
                input_type: turn.input_type,
            })),
        ),
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "Turn failed");
            failure(status_for(&e), format!("Turn failed: {}", e))
        }
    }
}

/// =============================
/// Upload Endpoint
/// =============================

async fn upload_handler(
    State(state): State<ApiState>,
    Json(req): Json<UploadRequest>,
) -> ApiResult {
    if req.filename.trim().is_empty() {
        return failure(StatusCode::BAD_REQUEST, "Filename is required".into());
    }

    match state
        .orchestrator
        .record_income_proof(&req.session_id, &req.filename)
        .await
    {
        Ok(upload) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "session_id": req.session_id,
                "filename": upload.filename,
                "uploaded_at": upload.uploaded_at,
                "message": "Salary slip uploaded successfully",
            }))),
        ),
        Err(e) => failure(status_for(&e), format!("Upload failed: {}", e)),
    }
}

/// =============================
/// Download Endpoint
/// =============================

async fn download_handler(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> ApiResult {
    match state.orchestrator.snapshot(&session_id).await {
        Ok(Some(record)) => match record.artifact {
            Some(artifact) => (StatusCode::OK, Json(ApiResponse::success(artifact))),
            None => failure(
                StatusCode::NOT_FOUND,
                "Sanction letter not available for this session".into(),
            ),
        },
        Ok(None) => failure(StatusCode::NOT_FOUND, format!("Unknown session: {}", session_id)),
        Err(e) => failure(status_for(&e), format!("Lookup failed: {}", e)),
    }
}

/// =============================
/// Customers Endpoint
/// =============================

async fn customers_handler(State(state): State<ApiState>) -> ApiResult {
    (
        StatusCode::OK,
        Json(ApiResponse::success(state.orchestrator.customers())),
    )
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/upload", post(upload_handler))
        .route("/api/download/:session_id", get(download_handler))
        .route("/api/customers", get(customers_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Lookups;
    use crate::audit::AuditLog;
    use crate::config::UnderwritingPolicy;
    use crate::sanction::SanctionLetterWriter;
    use crate::state::InMemorySessionStore;
    use crate::underwriting::UnderwritingEngine;
    use crate::verification::create_default_verification_engine;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn router(letters: &std::path::Path) -> Router {
        let orchestrator = Orchestrator::new(
            Arc::new(InMemorySessionStore::new()),
            create_default_verification_engine(),
            UnderwritingEngine::new(UnderwritingPolicy::default()),
            Lookups::seeded(),
            Arc::new(SanctionLetterWriter::new(letters)),
            Arc::new(AuditLog::new()),
        );
        create_router(Arc::new(orchestrator))
    }

    async fn call(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_chat_generates_session_and_reports_phase() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path());

        let (status, body) =
            call(&router, post_json("/api/chat", serde_json::json!({"message": "hi"}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "collecting");
        assert_eq!(body["data"]["requires_input"], true);
        assert_eq!(body["data"]["input_type"], "text");
        assert!(!body["data"]["session_id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path());

        let (status, body) =
            call(&router, post_json("/api/chat", serde_json::json!({"message": "  "}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_full_flow_then_download() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path());

        let turns = [
            "hello",
            "Rajesh Kumar",
            "9876543210",
            "500000",
            "24",
            "Salaried",
            "75000",
            "ok",
            "ok",
            "ok",
        ];

        let mut last = serde_json::Value::Null;
        for message in turns {
            let (status, body) = call(
                &router,
                post_json(
                    "/api/chat",
                    serde_json::json!({"message": message, "session_id": "web-1"}),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            last = body;
        }
        assert_eq!(last["data"]["status"], "completed");

        let (status, body) = call(&router, get_request("/api/download/web-1")).await;
        assert_eq!(status, StatusCode::OK);
        let reference = body["data"]["reference_id"].as_str().unwrap();
        assert!(reference.starts_with("PL/"));
    }

    #[tokio::test]
    async fn test_download_and_upload_for_unknown_session_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path());

        let (status, _) = call(&router, get_request("/api/download/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(
            &router,
            post_json(
                "/api/upload",
                serde_json::json!({"session_id": "nope", "filename": "slip.pdf"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_upload_for_live_session() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path());

        call(
            &router,
            post_json("/api/chat", serde_json::json!({"message": "hi", "session_id": "web-2"})),
        )
        .await;

        let (status, body) = call(
            &router,
            post_json(
                "/api/upload",
                serde_json::json!({"session_id": "web-2", "filename": "slip.pdf"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["filename"], "slip.pdf");
    }

    #[tokio::test]
    async fn test_customers_and_health() {
        let dir = tempfile::tempdir().unwrap();
        let router = router(dir.path());

        let (status, body) = call(&router, get_request("/api/customers")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 10);

        let (status, body) = call(&router, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }
}
