//! Mock answer source for integration tests
//!
//! Serves `/chat` with a canned JSON body and `/chat/stream` with canned
//! server-sent events, recording every request it receives.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use tokio_util::sync::CancellationToken;

/// How `/chat` responds
#[derive(Clone)]
pub enum AnswerMode {
    /// 200 with `{"result": answer}`
    Answer(String),
    /// 200 with a JSON body lacking `result`
    MissingResult,
    /// 200 with a non-JSON body
    NotJson,
    /// 500 with a plain-text body
    Fail,
    /// Answer after sleeping
    Slow(Duration, String),
}

/// Mock answer source that returns predictable responses
pub struct MockAnswerSource {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    mode: AnswerMode,
    /// `data` payloads served on `/chat/stream`; `None` answers 503
    events: Option<Vec<String>>,
    /// Header whose value is recorded per request
    identity_header: Option<String>,
    request_count: AtomicU32,
    queries: Mutex<Vec<serde_json::Value>>,
    identities: Mutex<Vec<Option<String>>>,
}

impl MockAnswerSource {
    /// Start a mock answering every question with `answer`
    pub async fn answering(answer: &str) -> anyhow::Result<Self> {
        Self::start(AnswerMode::Answer(answer.to_owned()), None, None).await
    }

    /// Start a mock that responds in the given mode
    pub async fn with_mode(mode: AnswerMode) -> anyhow::Result<Self> {
        Self::start(mode, None, None).await
    }

    /// Start a mock whose stream endpoint serves `events` as SSE data
    pub async fn streaming(events: &[&str]) -> anyhow::Result<Self> {
        let events = events.iter().map(|e| (*e).to_owned()).collect();
        Self::start(AnswerMode::Fail, Some(events), None).await
    }

    /// Start a mock that records the value of `header` on each request
    pub async fn recording_identity(answer: &str, header: &str) -> anyhow::Result<Self> {
        Self::start(AnswerMode::Answer(answer.to_owned()), None, Some(header.to_owned())).await
    }

    async fn start(
        mode: AnswerMode,
        events: Option<Vec<String>>,
        identity_header: Option<String>,
    ) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            mode,
            events,
            identity_header,
            request_count: AtomicU32::new(0),
            queries: Mutex::new(Vec::new()),
            identities: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/chat", routing::post(handle_answer))
            .route("/chat/stream", routing::post(handle_stream))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Address to configure as the answer source
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of requests received on either endpoint
    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::Relaxed)
    }

    /// Request bodies received, in order
    pub fn queries(&self) -> Vec<serde_json::Value> {
        self.state.queries.lock().unwrap().clone()
    }

    /// Recorded identity header values, in order
    pub fn identities(&self) -> Vec<Option<String>> {
        self.state.identities.lock().unwrap().clone()
    }
}

impl Drop for MockAnswerSource {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl MockState {
    fn record(&self, headers: &HeaderMap, body: serde_json::Value) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.queries.lock().unwrap().push(body);

        if let Some(name) = &self.identity_header {
            let value = headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            self.identities.lock().unwrap().push(value);
        }
    }
}

async fn handle_answer(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.record(&headers, body);

    match &state.mode {
        AnswerMode::Answer(answer) => Json(serde_json::json!({ "result": answer })).into_response(),
        AnswerMode::MissingResult => Json(serde_json::json!({ "answer": "misplaced" })).into_response(),
        AnswerMode::NotJson => (StatusCode::OK, "<html>maintenance</html>").into_response(),
        AnswerMode::Fail => (StatusCode::INTERNAL_SERVER_ERROR, "model crashed").into_response(),
        AnswerMode::Slow(delay, answer) => {
            tokio::time::sleep(*delay).await;
            Json(serde_json::json!({ "result": answer })).into_response()
        }
    }
}

async fn handle_stream(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.record(&headers, body);

    let Some(events) = &state.events else {
        return (StatusCode::SERVICE_UNAVAILABLE, "stream unavailable").into_response();
    };

    let body: String = events.iter().map(|data| format!("data: {data}\n\n")).collect();

    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

/// Listener that accepts connections and never writes a response
pub struct SilentListener {
    addr: SocketAddr,
    shutdown: CancellationToken,
}

impl SilentListener {
    /// Start accepting on a random local port
    pub async fn start() -> anyhow::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                tokio::select! {
                    () = shutdown_clone.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((socket, _)) => held.push(socket),
                        Err(_) => break,
                    },
                }
            }
        });

        Ok(Self { addr, shutdown })
    }

    /// Address to configure as the answer source
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for SilentListener {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
