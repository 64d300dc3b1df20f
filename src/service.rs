use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::{
    error::PipelineError,
    guidelines::GuidelineStore,
    models::{ChatRequest, ChatResponse, Criteria, ReportQuery, ReportResponse, UploadedDocument},
    pipeline::{LlmClient, OcrClient, chat, report},
};

type ApiResult<T> = Result<Json<T>, ApiError>;
type ApiError = (StatusCode, Json<Value>);

fn error_response(err: PipelineError) -> ApiError {
    (err.status(), Json(json!({ "error": err.to_string() })))
}

// Uploaded pathology PDFs are small; 20 MiB leaves room for scanned pages.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Shared, read-only per-process state. Request handlers never write to it.
#[derive(Clone)]
pub struct AppState {
    pub guidelines: Arc<GuidelineStore>,
    pub ocr: OcrClient,
    pub llm: LlmClient,
}

impl AppState {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            guidelines: Arc::new(GuidelineStore::load()?),
            ocr: OcrClient::from_env(),
            llm: LlmClient::from_env(),
        })
    }
}

pub fn create_app() -> anyhow::Result<Router> {
    Ok(build_router(AppState::from_env()?))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/generate-report", post(generate_report))
        .route("/api/chat", post(chat_completion))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Pathology Report Service",
        "version": "1.0.0",
        "description": "Generates guideline-referenced markdown reports from uploaded pathology documents",
        "endpoints": {
            "POST /api/generate-report?criteria=aua|nccn": "Upload a pathology PDF (field 'file') or page images (fields 'images') and generate a report",
            "POST /api/chat": "Answer a follow-up question against a generated report and its source text",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn generate_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
    multipart: Multipart,
) -> ApiResult<ReportResponse> {
    let criteria = Criteria::from_query(query.criteria.as_deref());
    let documents = collect_documents(multipart).await.map_err(error_response)?;

    info!(
        criteria = criteria.label(),
        parts = documents.len(),
        "report generation requested"
    );

    match report::generate_report(&state.ocr, &state.llm, &state.guidelines, criteria, documents)
        .await
    {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            error!("report generation failed: {e}");
            Err(error_response(e))
        }
    }
}

/// Drain the multipart body into uploaded documents. Accepts one `file` field
/// or any number of `images` fields; other fields are ignored.
async fn collect_documents(
    mut multipart: Multipart,
) -> Result<Vec<UploadedDocument>, PipelineError> {
    let mut documents = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PipelineError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name != "file" && name != "images" {
            continue;
        }

        let filename = field.file_name().unwrap_or("document").to_string();
        let content_type = match field.content_type() {
            Some(ct) if !ct.is_empty() => ct.to_string(),
            _ => "application/pdf".to_string(),
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| PipelineError::BadRequest(format!("Failed to read upload: {e}")))?;

        documents.push(UploadedDocument {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    if documents.is_empty() {
        return Err(PipelineError::BadRequest("No file uploaded.".to_string()));
    }
    Ok(documents)
}

async fn chat_completion(Json(request): Json<ChatRequest>) -> ApiResult<ChatResponse> {
    // Validation runs before any outbound call is issued.
    chat::validate_chat_request(&request).map_err(error_response)?;

    match chat::answer_question(&request).await {
        Ok(response) => Ok(Json(ChatResponse { response })),
        Err(e) => {
            error!("chat completion failed: {e}");
            Err(error_response(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-TEST-BOUNDARY";

    // ── stub upstream services ──────────────────────────────────────────

    #[derive(Clone)]
    struct OcrStub {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    /// Echoes the uploaded bytes back as the OCR content, so each request's
    /// extraction is distinguishable downstream.
    async fn ocr_stub_handler(
        State(stub): State<OcrStub>,
        mut multipart: Multipart,
    ) -> Json<Value> {
        stub.calls.fetch_add(1, Ordering::SeqCst);
        if stub.fail {
            return Json(json!({ "success": false }));
        }

        let mut content = String::new();
        while let Ok(Some(field)) = multipart.next_field().await {
            if field.name() == Some("file") {
                let bytes = field.bytes().await.unwrap_or_default();
                content = String::from_utf8_lossy(&bytes).to_string();
            }
        }
        Json(json!({ "success": true, "content": content }))
    }

    #[derive(Clone, Default)]
    struct LlmStub {
        requests: Arc<Mutex<Vec<String>>>,
    }

    async fn llm_stub_handler(State(stub): State<LlmStub>, body: String) -> Json<Value> {
        stub.requests.lock().unwrap().push(body);
        Json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "# Diagnosis\n\nHigh-grade papillary urothelial carcinoma (**Ta**)"
                }
            }]
        }))
    }

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn spawn_ocr_stub(fail: bool) -> (String, Arc<AtomicUsize>) {
        let stub = OcrStub {
            calls: Arc::new(AtomicUsize::new(0)),
            fail,
        };
        let calls = stub.calls.clone();
        let router = Router::new()
            .route("/ocr/text", post(ocr_stub_handler))
            .with_state(stub);
        (spawn_server(router).await, calls)
    }

    async fn spawn_llm_stub() -> (String, Arc<Mutex<Vec<String>>>) {
        let stub = LlmStub::default();
        let requests = stub.requests.clone();
        let router = Router::new()
            .route("/chat/completions", post(llm_stub_handler))
            .with_state(stub);
        (spawn_server(router).await, requests)
    }

    fn test_router(ocr_base: &str, llm_base: &str) -> Router {
        build_router(AppState {
            guidelines: Arc::new(GuidelineStore::load().unwrap()),
            ocr: OcrClient::new(ocr_base),
            llm: LlmClient::new(llm_base, "test-key"),
        })
    }

    // ── request helpers ─────────────────────────────────────────────────

    fn multipart_request(uri: &str, parts: &[(&str, &str, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, filename, bytes) in parts {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; \
                     name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/pdf\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn response_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    // ── endpoint tests ──────────────────────────────────────────────────

    #[tokio::test]
    async fn health_check_responds() {
        let (ocr_base, _) = spawn_ocr_stub(false).await;
        let (llm_base, _) = spawn_llm_stub().await;
        let app = test_router(&ocr_base, &llm_base);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response_json(response).await;
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn chat_rejects_whitespace_prompt() {
        let (ocr_base, _) = spawn_ocr_stub(false).await;
        let (llm_base, _) = spawn_llm_stub().await;
        let app = test_router(&ocr_base, &llm_base);

        let request = json_request(
            "/api/chat",
            json!({ "prompt": "   \n", "reportContext": "# Report" }),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("'prompt'"));
    }

    #[tokio::test]
    async fn chat_rejects_missing_contexts() {
        let (ocr_base, _) = spawn_ocr_stub(false).await;
        let (llm_base, _) = spawn_llm_stub().await;
        let app = test_router(&ocr_base, &llm_base);

        let request = json_request("/api/chat", json!({ "prompt": "What stage?" }));
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("context"));
    }

    #[tokio::test]
    async fn report_without_file_is_rejected() {
        let (ocr_base, ocr_calls) = spawn_ocr_stub(false).await;
        let (llm_base, llm_requests) = spawn_llm_stub().await;
        let app = test_router(&ocr_base, &llm_base);

        let response = app
            .oneshot(multipart_request("/api/generate-report", &[]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response_json(response).await;
        assert_eq!(body["error"], "No file uploaded.");
        assert_eq!(ocr_calls.load(Ordering::SeqCst), 0);
        assert!(llm_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ocr_failure_short_circuits_before_llm() {
        let (ocr_base, ocr_calls) = spawn_ocr_stub(true).await;
        let (llm_base, llm_requests) = spawn_llm_stub().await;
        let app = test_router(&ocr_base, &llm_base);

        let request = multipart_request(
            "/api/generate-report",
            &[("file", "scan.pdf", b"High-grade Ta")],
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response_json(response).await;
        assert_eq!(body["error"], "OCR service returned failure");
        assert_eq!(ocr_calls.load(Ordering::SeqCst), 1);
        assert!(llm_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn report_end_to_end() {
        let (ocr_base, ocr_calls) = spawn_ocr_stub(false).await;
        let (llm_base, llm_requests) = spawn_llm_stub().await;
        let app = test_router(&ocr_base, &llm_base);

        let ocr_text = "High-grade Ta, 2cm, solitary, no CIS";
        let request = multipart_request(
            "/api/generate-report",
            &[("file", "scan.pdf", ocr_text.as_bytes())],
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response_json(response).await;
        assert!(!body["markdownReport"].as_str().unwrap().is_empty());
        assert_eq!(body["results"][0]["file"], "scan.pdf");
        assert_eq!(body["results"][0]["output"], ocr_text);

        assert_eq!(ocr_calls.load(Ordering::SeqCst), 1);
        let requests = llm_requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].contains(ocr_text));
    }

    #[tokio::test]
    async fn report_honors_aua_criteria() {
        let (ocr_base, _) = spawn_ocr_stub(false).await;
        let (llm_base, llm_requests) = spawn_llm_stub().await;
        let app = test_router(&ocr_base, &llm_base);

        let request = multipart_request(
            "/api/generate-report?criteria=aua",
            &[("file", "scan.pdf", b"Low-grade Ta, 1cm, solitary")],
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let requests = llm_requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].contains("AUA"));
        assert!(!requests[0].contains("nccn_graph"));
    }

    #[tokio::test]
    async fn multi_image_upload_joins_pages_in_order() {
        let (ocr_base, ocr_calls) = spawn_ocr_stub(false).await;
        let (llm_base, llm_requests) = spawn_llm_stub().await;
        let app = test_router(&ocr_base, &llm_base);

        let request = multipart_request(
            "/api/generate-report",
            &[
                ("images", "page1.png", b"Page one findings".as_slice()),
                ("images", "page2.png", b"Page two findings".as_slice()),
            ],
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response_json(response).await;
        assert_eq!(body["results"].as_array().unwrap().len(), 2);
        assert_eq!(body["results"][0]["output"], "Page one findings");
        assert_eq!(body["results"][1]["output"], "Page two findings");

        assert_eq!(ocr_calls.load(Ordering::SeqCst), 2);
        let requests = llm_requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        // Joined in field order before assembly.
        assert!(requests[0].contains("Page one findings\\n\\nPage two findings"));
    }

    #[tokio::test]
    async fn concurrent_reports_do_not_leak_across_requests() {
        let (ocr_base, _) = spawn_ocr_stub(false).await;
        let (llm_base, llm_requests) = spawn_llm_stub().await;
        let app = test_router(&ocr_base, &llm_base);

        let first = multipart_request(
            "/api/generate-report",
            &[("file", "a.pdf", b"PATIENT-ALPHA high-grade T1")],
        );
        let second = multipart_request(
            "/api/generate-report",
            &[("file", "b.pdf", b"PATIENT-BRAVO low-grade Ta")],
        );

        let (first_response, second_response) =
            tokio::join!(app.clone().oneshot(first), app.clone().oneshot(second));
        assert_eq!(first_response.unwrap().status(), StatusCode::OK);
        assert_eq!(second_response.unwrap().status(), StatusCode::OK);

        let requests = llm_requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        for request in requests.iter() {
            let has_alpha = request.contains("PATIENT-ALPHA");
            let has_bravo = request.contains("PATIENT-BRAVO");
            assert!(
                has_alpha ^ has_bravo,
                "one request's OCR text leaked into the other's prompt"
            );
        }
    }
}
