// Copyright 2026 The Recap Project
// SPDX-License-Identifier: Apache-2.0

// HTTP server
//
// Responsibilities:
// - Accept summarize requests and turn them into jobs
// - Stream the attached job as server-sent events
// - Report job state and liveness
// - Open CORS so the browser extension can call in

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::completion::{CompletionError, OpenAiCompletionSource};
use crate::config::Config;
use crate::coordinator::{Coordinator, CoordinatorOptions, JobError, JobState};
use crate::prompt::{PromptBuilder, PromptError};
use crate::source::{Document, RedditExtractor, SourceError, SourceRegistry};
use crate::wire;

/// Largest accepted request body. Pre-extracted page text can be big.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned before a stream is opened.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("request body is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("request body is empty")]
    EmptyBody,

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Job(#[from] JobError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, public_message) = match &self {
            ServerError::MalformedJson(_) => {
                (StatusCode::BAD_REQUEST, "request body is not valid JSON")
            }
            ServerError::EmptyBody => (StatusCode::BAD_REQUEST, "request body is empty"),
            ServerError::Source(SourceError::UnsupportedSource(_)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "unsupported source: send page content or a reddit thread url",
            ),
            ServerError::Source(SourceError::ExtractionFailed(_)) => {
                (StatusCode::BAD_GATEWAY, "failed to extract page content")
            }
            ServerError::Job(JobError::AlreadyRunning) => {
                (StatusCode::CONFLICT, "a summary is already running")
            }
            ServerError::Job(JobError::Start(CompletionError::Timeout(_))) => {
                (StatusCode::GATEWAY_TIMEOUT, "completion request timed out")
            }
            ServerError::Job(JobError::Start(_)) => {
                (StatusCode::BAD_GATEWAY, "completion request failed")
            }
        };
        tracing::warn!(status = status.as_u16(), error = %self, "request rejected");
        (status, public_message).into_response()
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub url: String,
    /// Page text extracted by the client. Skips server-side extraction.
    #[serde(default)]
    pub content: Option<String>,
    /// Page title, used alongside `content`.
    #[serde(default)]
    pub title: Option<String>,
    /// Turns the summary into an answer to this question.
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummarizeResponse {
    pub job_id: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: JobState,
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Coordinator,
    pub sources: Arc<SourceRegistry>,
    pub prompts: Arc<PromptBuilder>,
}

impl AppState {
    /// Wire the production collaborators for `config`.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Result<Self, PromptError> {
        let completion = Arc::new(OpenAiCompletionSource::new(
            client.clone(),
            config.completion.clone(),
        ));
        let sources = SourceRegistry::new().with(Arc::new(RedditExtractor::new(
            client,
            config.sources.reddit.clone(),
        )));

        Ok(Self {
            coordinator: Coordinator::new(completion, CoordinatorOptions::from_config(config)),
            sources: Arc::new(sources),
            prompts: Arc::new(PromptBuilder::from_config(&config.prompt)?),
        })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /heartbeat -> 200 OK
pub async fn heartbeat() -> StatusCode {
    StatusCode::OK
}

/// POST /start-scrape-summarize
pub async fn start_summarize(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SummarizeResponse>, ServerError> {
    if body.is_empty() {
        return Err(ServerError::EmptyBody);
    }
    let request: SummarizeRequest =
        serde_json::from_slice(&body).map_err(|e| ServerError::MalformedJson(e.to_string()))?;

    // Fail fast before fetching anything; submit re-checks under the lock.
    if state.coordinator.state() != JobState::Idle {
        return Err(JobError::AlreadyRunning.into());
    }

    let document = match request.content.filter(|c| !c.trim().is_empty()) {
        Some(content) => {
            Document::from_page_text(request.url.as_str(), content).with_title(request.title)
        }
        None => state.sources.extract(&request.url).await?,
    };
    tracing::info!(
        url = %document.url,
        kind = ?document.kind,
        chars = document.text.len(),
        question = request.question.is_some(),
        "document ready"
    );

    let prompt = state.prompts.build(&document, request.question.as_deref());
    let job_id = state.coordinator.submit(&prompt).await?;

    Ok(Json(SummarizeResponse {
        job_id: job_id.to_string(),
    }))
}

/// GET /stream-summary
///
/// Waits for the next submitted job and streams it. The response headers
/// are only sent once a job has been taken.
pub async fn stream_summary(State(state): State<AppState>) -> Response {
    let events = state.coordinator.attach().await;
    let body = Body::from_stream(events.map(Ok::<Bytes, std::io::Error>));

    (
        [
            (header::CONTENT_TYPE, wire::CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

/// GET /job-status
pub async fn job_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        state: state.coordinator.state(),
    })
}

// ---------------------------------------------------------------------------
// Router construction
// ---------------------------------------------------------------------------

/// Build the axum router. All collaborators are injected through `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/heartbeat", get(heartbeat))
        .route("/start-scrape-summarize", post(start_summarize))
        .route("/stream-summary", get(stream_summary))
        .route("/job-status", get(job_status))
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{CompletionSource, FragmentStream};
    use crate::config::PromptTemplates;
    use crate::coordinator::CoordinatorOptions;
    use crate::prompt::{ApproxTokenCounter, Prompt};
    use crate::source::{DocumentKind, SourceExtractor};
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt; // for oneshot

    // -----------------------------------------------------------------------
    // Mocks
    // -----------------------------------------------------------------------

    /// Replays fixed fragments and records the last prompt it was started with.
    struct MockCompletion {
        fragments: Vec<&'static str>,
        start_error: Option<fn() -> CompletionError>,
        last_prompt: parking_lot::Mutex<Option<Prompt>>,
    }

    impl MockCompletion {
        fn new(fragments: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                fragments,
                start_error: None,
                last_prompt: parking_lot::Mutex::new(None),
            })
        }

        fn failing(make: fn() -> CompletionError) -> Arc<Self> {
            Arc::new(Self {
                fragments: vec![],
                start_error: Some(make),
                last_prompt: parking_lot::Mutex::new(None),
            })
        }
    }

    #[async_trait::async_trait]
    impl CompletionSource for MockCompletion {
        async fn start(&self, prompt: &Prompt) -> Result<FragmentStream, CompletionError> {
            *self.last_prompt.lock() = Some(prompt.clone());
            if let Some(make) = self.start_error {
                return Err(make());
            }
            let items: Vec<Result<String, CompletionError>> =
                self.fragments.iter().map(|f| Ok(f.to_string())).collect();
            Ok(Box::pin(futures_util::stream::iter(items)))
        }

        fn footer_label(&self) -> &str {
            "mock-model"
        }
    }

    /// Accepts `https://threads.test/...` and returns canned text, or fails
    /// for paths containing "broken".
    struct MockExtractor;

    #[async_trait::async_trait]
    impl SourceExtractor for MockExtractor {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn accepts(&self, url: &reqwest::Url) -> bool {
            url.host_str() == Some("threads.test")
        }

        async fn extract(&self, url: &reqwest::Url) -> Result<Document, SourceError> {
            if url.path().contains("broken") {
                return Err(SourceError::ExtractionFailed("listing gone".into()));
            }
            Ok(Document {
                url: url.to_string(),
                kind: DocumentKind::Reddit,
                title: Some("A thread".into()),
                text: "thread text".into(),
            })
        }
    }

    fn templates() -> PromptTemplates {
        PromptTemplates {
            system: "sys".into(),
            reddit_instructions: "Summarize a reddit post.".into(),
            page_instructions: "Summarize a web page.".into(),
            question_instructions: "Answer: {question}".into(),
        }
    }

    fn app_with(completion: Arc<MockCompletion>) -> (Router, Coordinator) {
        let coordinator = Coordinator::new(completion, CoordinatorOptions::default());
        let state = AppState {
            coordinator: coordinator.clone(),
            sources: Arc::new(SourceRegistry::new().with(Arc::new(MockExtractor))),
            prompts: Arc::new(PromptBuilder::new(
                templates(),
                1000,
                Arc::new(ApproxTokenCounter),
            )),
        };
        (build_router(state), coordinator)
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/start-scrape-summarize")
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    async fn body_string(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    // -----------------------------------------------------------------------
    // Heartbeat and status
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn heartbeat_returns_200() {
        let (app, _) = app_with(MockCompletion::new(vec![]));
        let resp = app.oneshot(get("/heartbeat")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn job_status_reports_idle_then_ready() {
        let (app, _) = app_with(MockCompletion::new(vec!["x"]));

        let resp = app.clone().oneshot(get("/job-status")).await.unwrap();
        assert_eq!(body_string(resp).await, r#"{"state":"idle"}"#);

        let resp = app
            .clone()
            .oneshot(post_json(r#"{"url":"https://threads.test/t/1"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.oneshot(get("/job-status")).await.unwrap();
        assert_eq!(body_string(resp).await, r#"{"state":"ready"}"#);
    }

    #[tokio::test]
    async fn unknown_path_returns_404() {
        let (app, _) = app_with(MockCompletion::new(vec![]));
        let resp = app.oneshot(get("/v1/unknown")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    // -----------------------------------------------------------------------
    // Submit
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn submit_returns_job_id() {
        let (app, _) = app_with(MockCompletion::new(vec!["x"]));
        let resp = app
            .oneshot(post_json(r#"{"url":"https://threads.test/t/1"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let parsed: SummarizeResponse = serde_json::from_str(&body_string(resp).await).unwrap();
        assert!(uuid::Uuid::parse_str(&parsed.job_id).is_ok());
    }

    #[tokio::test]
    async fn content_bypasses_extraction_and_question_reaches_prompt() {
        let completion = MockCompletion::new(vec!["x"]);
        let (app, _) = app_with(completion.clone());

        let resp = app
            .oneshot(post_json(
                r#"{"url":"https://blog.test/post","content":"page text","question":"why?"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let prompt = completion.last_prompt.lock().clone().unwrap();
        assert_eq!(prompt.system, "sys");
        assert_eq!(prompt.user, "Answer: why?\n\npage text");
    }

    #[tokio::test]
    async fn client_page_title_reaches_prompt() {
        let completion = MockCompletion::new(vec!["x"]);
        let (app, _) = app_with(completion.clone());

        let resp = app
            .oneshot(post_json(
                r#"{"url":"https://blog.test/post","content":"page text","title":"  Release notes "}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let prompt = completion.last_prompt.lock().clone().unwrap();
        assert_eq!(
            prompt.user,
            "Summarize a web page.\n\nTitle: Release notes\n\npage text"
        );
    }

    #[tokio::test]
    async fn extracted_thread_uses_reddit_instructions() {
        let completion = MockCompletion::new(vec!["x"]);
        let (app, _) = app_with(completion.clone());

        app.oneshot(post_json(r#"{"url":"https://threads.test/t/1","content":"  "}"#))
            .await
            .unwrap();

        let prompt = completion.last_prompt.lock().clone().unwrap();
        assert_eq!(prompt.user, "Summarize a reddit post.\n\nthread text");
    }

    #[tokio::test]
    async fn malformed_json_returns_400() {
        let (app, _) = app_with(MockCompletion::new(vec![]));
        let resp = app.oneshot(post_json("this is not json {{{")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(resp).await.contains("not valid JSON"));
    }

    #[tokio::test]
    async fn missing_url_returns_400() {
        let (app, _) = app_with(MockCompletion::new(vec![]));
        let resp = app.oneshot(post_json(r#"{"content":"text"}"#)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_body_returns_400() {
        let (app, _) = app_with(MockCompletion::new(vec![]));
        let resp = app.oneshot(post_json("")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(resp).await.contains("empty"));
    }

    #[tokio::test]
    async fn unsupported_url_returns_422() {
        let (app, coordinator) = app_with(MockCompletion::new(vec![]));
        let resp = app
            .oneshot(post_json(r#"{"url":"https://elsewhere.test/page"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(coordinator.state(), JobState::Idle);
    }

    #[tokio::test]
    async fn extraction_failure_returns_502() {
        let (app, coordinator) = app_with(MockCompletion::new(vec![]));
        let resp = app
            .oneshot(post_json(r#"{"url":"https://threads.test/broken"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(coordinator.state(), JobState::Idle);
    }

    #[tokio::test]
    async fn second_submit_returns_409() {
        let (app, _) = app_with(MockCompletion::new(vec!["x"]));
        let body = r#"{"url":"https://threads.test/t/1"}"#;

        let first = app.clone().oneshot(post_json(body)).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(post_json(body)).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn upstream_start_failure_returns_502() {
        let (app, coordinator) = app_with(MockCompletion::failing(|| CompletionError::Status {
            status: 401,
            body: "bad key".into(),
        }));
        let resp = app
            .oneshot(post_json(r#"{"url":"https://threads.test/t/1"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert!(!body_string(resp).await.contains("bad key"), "details stay private");
        assert_eq!(coordinator.state(), JobState::Idle);
    }

    #[tokio::test]
    async fn upstream_start_timeout_returns_504() {
        let (app, _) = app_with(MockCompletion::failing(|| {
            CompletionError::Timeout("30s".into())
        }));
        let resp = app
            .oneshot(post_json(r#"{"url":"https://threads.test/t/1"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    // -----------------------------------------------------------------------
    // Stream
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn stream_delivers_segmented_events() {
        let (app, coordinator) = app_with(MockCompletion::new(vec![
            "<think>plan",
            "</think>## Summary\n",
            "Done.",
        ]));

        app.clone()
            .oneshot(post_json(r#"{"url":"https://threads.test/t/1"}"#))
            .await
            .unwrap();

        let resp = app.oneshot(get("/stream-summary")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-cache");

        let body = body_string(resp).await;
        assert_eq!(
            body,
            "data: __THINKING_START__\n\n\
             data: __THINKING_CONTENT__plan\n\n\
             data: __THINKING_END__\n\n\
             data: ## Summary\\n\n\n\
             data: Done.\n\n\
             data: \ndata: ---\ndata: # Powered by mock-model\n\n"
        );

        tokio::time::timeout(Duration::from_secs(1), async {
            while coordinator.state() != JobState::Idle {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("slot released after stream");
    }

    #[tokio::test]
    async fn stream_request_waits_for_submit() {
        let (app, _) = app_with(MockCompletion::new(vec!["late"]));

        let stream = tokio::spawn(app.clone().oneshot(get("/stream-summary")));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!stream.is_finished());

        app.oneshot(post_json(r#"{"url":"https://threads.test/t/1"}"#))
            .await
            .unwrap();

        let resp = stream.await.unwrap().unwrap();
        assert!(body_string(resp).await.starts_with("data: late\n\n"));
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let (app, _) = app_with(MockCompletion::new(vec![]));
        let req = Request::builder()
            .uri("/heartbeat")
            .header("origin", "chrome-extension://abcdef")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    }
}
