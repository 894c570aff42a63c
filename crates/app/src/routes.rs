use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use docqa_core::{is_pdf_name, DocumentSummary, UploadOutcome};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default = "default_session")]
    pub session_id: String,
}

fn default_session() -> String {
    "default_session".to_string()
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub context_sources: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentQuery {
    pub document_id: String,
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub processed_count: usize,
    pub skipped: Vec<String>,
}

pub fn router(state: AppState, cors: CorsLayer, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/documents", get(list_documents))
        .route(
            "/upload_documents",
            post(upload_documents).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/query_ai", post(query_ai))
        .route("/query", post(query))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub fn cors_layer(origins: &[String]) -> Result<CorsLayer, axum::http::header::InvalidHeaderValue> {
    let origins = origins
        .iter()
        .map(|origin| HeaderValue::from_str(origin))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "AI Agent is running and healthy."
    }))
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    info!(session = %request.session_id, "received question");

    let answer = state.coordinator().chat(&request.message).await?;
    Ok(Json(ChatResponse {
        response: answer.response,
        context_sources: answer.context_sources,
    }))
}

async fn list_documents(State(state): State<AppState>) -> Json<Vec<DocumentSummary>> {
    Json(state.coordinator().documents().list())
}

async fn upload_documents(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| ApiError::BadRequest(format!("invalid multipart body: {error}")))?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|error| ApiError::BadRequest(format!("failed to read '{name}': {error}")))?;
        files.push((name, bytes));
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest("No files were uploaded.".to_string()));
    }

    // Reject the whole batch before anything touches disk or the store.
    if let Some((name, _)) = files.iter().find(|(name, _)| !is_pdf_name(name)) {
        return Err(ApiError::BadRequest(format!(
            "Only PDF files are allowed. '{name}' is not a PDF."
        )));
    }

    let mut processed_count = 0;
    let mut skipped = Vec::new();
    for (name, bytes) in files {
        match state.coordinator().ingest_upload(&name, bytes.to_vec()).await? {
            UploadOutcome::Stored(_) => processed_count += 1,
            UploadOutcome::Skipped { name, reason } => {
                info!(file = %name, %reason, "upload skipped");
                skipped.push(name);
            }
        }
    }

    Ok(Json(UploadResponse {
        message: format!("Successfully processed {processed_count} PDF document(s)."),
        processed_count,
        skipped,
    }))
}

async fn query_ai(
    State(state): State<AppState>,
    Json(request): Json<DocumentQuery>,
) -> ApiResult<Json<Value>> {
    let response = state
        .coordinator()
        .ask_document(&request.document_id, &request.query)
        .await?;
    Ok(Json(json!({ "response": response })))
}

async fn query(
    State(state): State<AppState>,
    Json(request): Json<DocumentQuery>,
) -> ApiResult<Json<Value>> {
    let answer = state
        .coordinator()
        .ask_document(&request.document_id, &request.query)
        .await?;
    Ok(Json(json!({ "answer": answer })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Coordinator;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
    use docqa_core::{
        AnswerSettings, CharacterNgramEmbedder, ChunkingConfig, CompletionClient, CompletionError,
        CompletionRequest, Document, DocumentStore, KnowledgeBase, LopdfExtractor, UploadDir,
    };
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    struct EchoCompletion;

    #[async_trait]
    impl CompletionClient for EchoCompletion {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
            Ok(format!("echo: {}", request.user.len()))
        }
    }

    fn coordinator(dir: &Path) -> Coordinator {
        let knowledge = Arc::new(KnowledgeBase::new(
            Arc::new(CharacterNgramEmbedder::default()),
            ChunkingConfig::default(),
            dir.join("vector_index"),
        ));
        Coordinator::new(
            Box::new(EchoCompletion),
            DocumentStore::new(),
            knowledge,
            Arc::new(LopdfExtractor),
            UploadDir::new(dir.join("pdfs")),
            AnswerSettings::default(),
        )
    }

    fn app() -> (TempDir, AppState, Router) {
        let dir = tempdir().expect("temp dir");
        let state = AppState::new(coordinator(dir.path()));
        let cors = cors_layer(&["http://localhost:5173".to_string()]).expect("valid origin");
        let router = router(state.clone(), cors, 10 * 1024 * 1024);
        (dir, state, router)
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn multipart_request(files: &[(&str, &[u8])]) -> Request<Body> {
        let boundary = "docqa-test-boundary";
        let mut body = Vec::new();
        for (name, bytes) in files {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/upload_documents")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (_dir, _state, app) = app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn documents_are_listed() {
        let (_dir, state, app) = app();
        state
            .coordinator()
            .documents()
            .insert(Document::new("guideline", "guideline.pdf", "Administer 500mg."));

        let response = app
            .oneshot(Request::get("/documents").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body, json!([{ "id": "guideline", "name": "guideline.pdf" }]));
    }

    #[tokio::test]
    async fn chat_before_indexing_is_unavailable() {
        let (_dir, _state, app) = app();
        let response = app
            .oneshot(json_request("/chat", json!({ "message": "What is the dosage?" })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_json(response).await["detail"].is_string());
    }

    #[tokio::test]
    async fn chat_returns_answer_and_sources() {
        let (_dir, state, app) = app();
        let document = Document::new("dosing", "dosing.pdf", "Administer 500mg every 8 hours.");
        state.coordinator().documents().insert(document.clone());
        state
            .coordinator()
            .knowledge()
            .initialize(&[document])
            .expect("index builds");

        let response = app
            .oneshot(json_request(
                "/chat",
                json!({ "message": "What is the dosage?", "session_id": "abc" }),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["response"].as_str().unwrap_or_default().starts_with("echo:"));
        assert_eq!(body["context_sources"], json!(["dosing.pdf"]));
    }

    #[tokio::test]
    async fn unknown_document_is_not_found_on_both_query_routes() {
        let (_dir, _state, app) = app();
        for uri in ["/query", "/query_ai"] {
            let response = app
                .clone()
                .oneshot(json_request(
                    uri,
                    json!({ "document_id": "missing", "query": "What is the dosage?" }),
                ))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn query_routes_use_their_own_response_keys() {
        let (_dir, state, app) = app();
        state
            .coordinator()
            .documents()
            .add("guideline", "guideline.pdf", "Administer 500mg every 8 hours.");
        let body = json!({ "document_id": "guideline", "query": "What is the dosage?" });

        let response = app
            .clone()
            .oneshot(json_request("/query_ai", body.clone()))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await["response"].is_string());

        let response = app
            .oneshot(json_request("/query", body))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await["answer"].is_string());
    }

    #[tokio::test]
    async fn non_pdf_upload_is_rejected_without_touching_the_store() {
        let (dir, state, app) = app();
        let response = app
            .oneshot(multipart_request(&[
                ("broken.pdf", b"%PDF-1.4\n%broken".as_slice()),
                ("notes.txt", b"plain text".as_slice()),
            ]))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.coordinator().documents().is_empty());
        assert!(!dir.path().join("pdfs").exists());
    }

    #[tokio::test]
    async fn unreadable_pdf_is_skipped_without_failing_the_batch() {
        let (_dir, state, app) = app();
        let response = app
            .oneshot(multipart_request(&[("broken.pdf", b"%PDF-1.4\n%broken".as_slice())]))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["processed_count"], 0);
        assert_eq!(body["skipped"], json!(["broken.pdf"]));
        assert!(state.coordinator().documents().is_empty());
    }

    #[tokio::test]
    async fn empty_upload_is_a_bad_request() {
        let (_dir, _state, app) = app();
        let response = app.oneshot(multipart_request(&[])).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
