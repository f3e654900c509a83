//! Relay of the answer source's native event stream
//!
//! The answer source can also stream server-sent events whose `data`
//! payloads are JSON objects tagged by `type`. The relay re-frames those
//! events for the front end, fills in defaults, ends the stream after an
//! `end` or `error` event, and drops anything it cannot parse.

use std::pin::Pin;
use std::time::{Duration, Instant};

use counsel_config::UpstreamConfig;
use counsel_core::RequestContext;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt, future, stream};
use http::HeaderName;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::ChatError;
use crate::metrics::{ChatMetrics, ROUTE_RELAY};
use crate::source::{parse_identity_header, parse_timeout};
use crate::types::AnswerQuery;

/// Boxed stream of relay frames for one chat turn
pub type RelayStream = Pin<Box<dyn Stream<Item = RelayFrame> + Send>>;

/// One frame sent to the consumer
#[derive(Debug, Clone, PartialEq)]
pub enum RelayFrame {
    /// A re-framed upstream event
    Event(RelayEvent),
    /// Reading the upstream stream failed; always the last frame
    Failure { details: String },
    /// Sent after an `end` event; always the last frame
    Done,
}

impl RelayFrame {
    /// Whether no frame may follow this one
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done | Self::Failure { .. } | Self::Event(RelayEvent::Error { .. })
        )
    }

    /// SSE `data` payload for this frame
    pub fn data(&self) -> String {
        match self {
            Self::Event(event) => serde_json::to_string(event).unwrap_or_default(),
            Self::Failure { details } => serde_json::json!({
                "error": "Stream processing error",
                "details": details,
            })
            .to_string(),
            Self::Done => "[DONE]".to_owned(),
        }
    }
}

/// Event forwarded to the consumer
///
/// An absent `chat_id` is omitted rather than sent as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    Start {
        message: String,
        #[serde(skip_serializing_if = "Value::is_null")]
        chat_id: Value,
    },
    Content {
        content: String,
        #[serde(skip_serializing_if = "Value::is_null")]
        chat_id: Value,
        current_agent: String,
    },
    End {
        message: String,
        #[serde(skip_serializing_if = "Value::is_null")]
        chat_id: Value,
    },
    Error {
        error: String,
        #[serde(skip_serializing_if = "Value::is_null")]
        chat_id: Value,
    },
}

/// Event as produced by the answer source
///
/// Side fields are loosely typed so a field of the wrong type falls back
/// to its default instead of discarding the event.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum UpstreamEvent {
    Start {
        #[serde(default)]
        message: Value,
        #[serde(default)]
        chat_id: Value,
    },
    Content {
        #[serde(default)]
        content: Value,
        #[serde(default)]
        chat_id: Value,
        #[serde(default)]
        current_agent: Value,
    },
    End {
        #[serde(default)]
        message: Value,
        #[serde(default)]
        chat_id: Value,
    },
    Error {
        #[serde(default)]
        error: Value,
        #[serde(default)]
        chat_id: Value,
    },
}

impl UpstreamEvent {
    /// Frames to forward for this event, empty when it is skipped
    fn into_frames(self) -> Vec<RelayFrame> {
        match self {
            Self::Start { message, chat_id } => vec![RelayFrame::Event(RelayEvent::Start {
                message: text_or(message, "Starting..."),
                chat_id,
            })],
            Self::Content {
                content,
                chat_id,
                current_agent,
            } => match non_empty_text(content) {
                Some(content) => vec![RelayFrame::Event(RelayEvent::Content {
                    content,
                    chat_id,
                    current_agent: text_or(current_agent, "unknown"),
                })],
                None => Vec::new(),
            },
            Self::End { message, chat_id } => vec![
                RelayFrame::Event(RelayEvent::End {
                    message: text_or(message, "Response completed"),
                    chat_id,
                }),
                RelayFrame::Done,
            ],
            Self::Error { error, chat_id } => vec![RelayFrame::Event(RelayEvent::Error {
                error: text_or(error, "Unknown error"),
                chat_id,
            })],
        }
    }
}

fn non_empty_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text),
        _ => None,
    }
}

fn text_or(value: Value, fallback: &str) -> String {
    non_empty_text(value).unwrap_or_else(|| fallback.to_owned())
}

/// Frames for one SSE `data` payload
fn frames_for_data(data: &str) -> Vec<RelayFrame> {
    let data = data.trim();
    if data.is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<UpstreamEvent>(data) {
        Ok(event) => event.into_frames(),
        Err(e) => {
            tracing::warn!(error = %e, payload = data, "skipping unparseable upstream event");
            Vec::new()
        }
    }
}

/// Re-frame a stream of SSE `data` payloads, ending after a terminal frame
fn relay_frames<S, E>(events: S) -> impl Stream<Item = RelayFrame> + Send
where
    S: Stream<Item = Result<String, E>> + Send,
    E: std::fmt::Display,
{
    events
        .flat_map(|result| {
            let frames = match result {
                Ok(data) => frames_for_data(&data),
                Err(e) => {
                    tracing::error!(error = %e, "upstream event stream failed");
                    vec![RelayFrame::Failure { details: e.to_string() }]
                }
            };
            stream::iter(frames)
        })
        .scan(false, |finished, frame| {
            if *finished {
                return future::ready(None);
            }
            *finished = frame.is_terminal();
            future::ready(Some(frame))
        })
}

/// Client for the answer source's event-stream endpoint
pub struct EventRelay {
    client: Client,
    stream_url: Url,
    timeout: Duration,
    identity_header: Option<HeaderName>,
    metrics: ChatMetrics,
}

impl EventRelay {
    /// Create from upstream configuration
    ///
    /// The configured timeout bounds the wait for response headers; an
    /// open stream may run for as long as the answer source keeps it open.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, ChatError> {
        let stream_url = config.stream_url().map_err(ChatError::Internal)?;
        let timeout = parse_timeout(&config.timeout)?;

        let identity_header = parse_identity_header(config.identity_header.as_deref())?;

        Self::new(stream_url, timeout, identity_header)
    }

    fn new(stream_url: Url, timeout: Duration, identity_header: Option<HeaderName>) -> Result<Self, ChatError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ChatError::Internal(anyhow::anyhow!("failed to build relay client: {e}")))?;

        Ok(Self {
            client,
            stream_url,
            timeout,
            identity_header,
            metrics: ChatMetrics::default(),
        })
    }

    /// URL the event stream is opened against
    pub const fn stream_url(&self) -> &Url {
        &self.stream_url
    }

    /// Open the upstream event stream for `query`
    ///
    /// Transport failures and non-success statuses are returned before any
    /// frame exists.
    pub async fn open(&self, query: &AnswerQuery, context: &RequestContext) -> Result<RelayStream, ChatError> {
        tracing::debug!(url = %self.stream_url, chat_id = ?query.chat_id, "opening upstream event stream");

        let mut builder = self
            .client
            .post(self.stream_url.clone())
            .header(http::header::ACCEPT, "text/event-stream")
            .header(http::header::CACHE_CONTROL, "no-cache")
            .json(query);

        if let Some(header) = &self.identity_header
            && let Some(client_id) = context.client_id()
        {
            builder = builder.header(header, client_id);
        }

        let start = Instant::now();
        let response = match tokio::time::timeout(self.timeout, builder.send()).await {
            Ok(Ok(response)) => response,
            Err(_) => {
                tracing::error!(url = %self.stream_url, timeout = ?self.timeout, "upstream stream did not respond in time");
                self.metrics.record_upstream(ROUTE_RELAY, start, ChatError::UpstreamTimeout.outcome());
                return Err(ChatError::UpstreamTimeout);
            }
            Ok(Err(e)) => {
                tracing::error!(url = %self.stream_url, error = %e, "upstream stream request failed");
                let error = ChatError::from_reqwest(&e);
                self.metrics.record_upstream(ROUTE_RELAY, start, error.outcome());
                return Err(error);
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(url = %self.stream_url, status = %status, "upstream stream returned error");
            self.metrics.record_upstream(ROUTE_RELAY, start, "upstream_unavailable");
            return Err(ChatError::UpstreamUnavailable(format!("answer source returned {status}: {body}")));
        }
        self.metrics.record_upstream(ROUTE_RELAY, start, "ok");

        let events = response.bytes_stream().eventsource().map(|result| result.map(|event| event.data));

        Ok(Box::pin(relay_frames(events)))
    }
}

#[cfg(test)]
mod tests {
    use counsel_core::HttpError;
    use serde_json::json;

    use super::*;

    async fn relay_all(payloads: Vec<Result<&str, &str>>) -> Vec<RelayFrame> {
        let events = stream::iter(payloads.into_iter().map(|p| p.map(str::to_owned)));
        relay_frames(events).collect().await
    }

    #[tokio::test]
    async fn full_conversation_is_reframed() {
        let frames = relay_all(vec![
            Ok(r#"{"type":"start","chat_id":7}"#),
            Ok(r#"{"type":"content","content":"Under ","chat_id":7,"current_agent":"contracts"}"#),
            Ok(r#"{"type":"content","content":"Article 351","chat_id":7}"#),
            Ok(r#"{"type":"end","chat_id":7}"#),
        ])
        .await;

        let data: Vec<String> = frames.iter().map(RelayFrame::data).collect();
        let parsed: Vec<Value> = data[..4].iter().map(|d| serde_json::from_str(d).unwrap()).collect();

        assert_eq!(parsed[0], json!({"type": "start", "message": "Starting...", "chat_id": 7}));
        assert_eq!(
            parsed[1],
            json!({"type": "content", "content": "Under ", "chat_id": 7, "current_agent": "contracts"})
        );
        assert_eq!(parsed[2]["current_agent"], "unknown");
        assert_eq!(parsed[3], json!({"type": "end", "message": "Response completed", "chat_id": 7}));
        assert_eq!(data[4], "[DONE]");
        assert_eq!(frames.len(), 5);
    }

    #[tokio::test]
    async fn nothing_after_end_is_forwarded() {
        let frames = relay_all(vec![
            Ok(r#"{"type":"end","message":"bye"}"#),
            Ok(r#"{"type":"content","content":"late"}"#),
        ])
        .await;

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], RelayFrame::Done);
    }

    #[tokio::test]
    async fn error_event_ends_the_stream() {
        let frames = relay_all(vec![
            Ok(r#"{"type":"error","chat_id":"c1"}"#),
            Ok(r#"{"type":"content","content":"late"}"#),
        ])
        .await;

        assert_eq!(frames, vec![RelayFrame::Event(RelayEvent::Error {
            error: "Unknown error".to_owned(),
            chat_id: json!("c1"),
        })]);
    }

    #[tokio::test]
    async fn malformed_and_empty_events_are_skipped() {
        let frames = relay_all(vec![
            Ok("not json"),
            Ok(r#"{"type":"thinking"}"#),
            Ok(""),
            Ok(r#"{"type":"content","content":""}"#),
            Ok(r#"{"type":"content","content":"kept"}"#),
        ])
        .await;

        assert_eq!(frames.len(), 1);
        assert!(matches!(&frames[0], RelayFrame::Event(RelayEvent::Content { content, .. }) if content == "kept"));
    }

    #[tokio::test]
    async fn read_failure_is_reported_then_ends() {
        let frames = relay_all(vec![
            Ok(r#"{"type":"content","content":"partial"}"#),
            Err("connection reset"),
            Ok(r#"{"type":"content","content":"late"}"#),
        ])
        .await;

        assert_eq!(frames.len(), 2);
        let failure: Value = serde_json::from_str(&frames[1].data()).unwrap();
        assert_eq!(failure, json!({"error": "Stream processing error", "details": "connection reset"}));
    }

    #[tokio::test]
    async fn upstream_closing_without_end_just_ends() {
        let frames = relay_all(vec![Ok(r#"{"type":"content","content":"partial"}"#)]).await;
        assert_eq!(frames.len(), 1);
        assert!(!frames[0].is_terminal());
    }

    #[tokio::test]
    async fn wrongly_typed_side_fields_keep_the_content() {
        let frames = relay_all(vec![
            Ok(r#"{"type":"content","content":"x","chat_id":5,"current_agent":3}"#),
            Ok(r#"{"type":"error","error":{"code":500}}"#),
        ])
        .await;

        let data: Vec<Value> = frames.iter().map(|f| serde_json::from_str(&f.data()).unwrap()).collect();
        assert_eq!(
            data,
            vec![
                json!({"type": "content", "content": "x", "chat_id": 5, "current_agent": "unknown"}),
                json!({"type": "error", "error": "Unknown error"}),
            ]
        );
    }

    #[tokio::test]
    async fn absent_chat_id_is_omitted() {
        let frames = relay_all(vec![Ok(r#"{"type":"start"}"#)]).await;
        assert_eq!(frames[0].data(), r#"{"type":"start","message":"Starting..."}"#);
    }

    #[tokio::test]
    async fn silent_answer_source_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let holder = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = UpstreamConfig {
            host: format!("http://{}", addr.ip()),
            port: addr.port().to_string(),
            timeout: "200ms".to_owned(),
            ..UpstreamConfig::default()
        };
        let relay = EventRelay::from_config(&config).unwrap();
        let query = AnswerQuery {
            question: "Anyone there?".to_owned(),
            chat_id: None,
            files: Vec::new(),
        };

        let result = tokio::time::timeout(Duration::from_secs(3), relay.open(&query, &RequestContext::empty()))
            .await
            .expect("open returned before the test deadline");

        let Err(error) = result else {
            panic!("silent answer source produced a stream");
        };
        assert!(matches!(error, ChatError::UpstreamTimeout));
        assert_eq!(error.status_code(), http::StatusCode::GATEWAY_TIMEOUT);
        holder.abort();
    }

    #[test]
    fn config_builds_stream_url() {
        let config = UpstreamConfig {
            host: "http://localhost".to_owned(),
            port: "8000".to_owned(),
            ..UpstreamConfig::default()
        };

        let relay = EventRelay::from_config(&config).unwrap();
        assert_eq!(relay.stream_url().as_str(), "http://localhost:8000/chat/stream");
    }
}
