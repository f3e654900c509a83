//! Answer source client
//!
//! The answer source is the upstream AI service. It takes the current
//! question plus conversation and file references and returns the whole
//! answer in one JSON body.

use std::time::Duration;

use async_trait::async_trait;
use counsel_config::UpstreamConfig;
use counsel_core::RequestContext;
use http::HeaderName;
use reqwest::Client;
use url::Url;

use crate::error::ChatError;
use crate::types::AnswerQuery;

/// Upstream that resolves a question into a complete answer
#[async_trait]
pub trait AnswerSource: Send + Sync {
    /// Fetch the full answer text for `query`
    ///
    /// Fails with `UpstreamUnavailable` or `UpstreamTimeout`; never
    /// returns a partial answer.
    async fn fetch_answer(&self, query: &AnswerQuery, context: &RequestContext) -> Result<String, ChatError>;
}

/// Answer source reached over HTTP
pub struct HttpAnswerSource {
    client: Client,
    answer_url: Url,
    timeout: Duration,
    identity_header: Option<HeaderName>,
}

impl HttpAnswerSource {
    /// Create from upstream configuration
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, ChatError> {
        let answer_url = config.answer_url().map_err(ChatError::Internal)?;
        let timeout = parse_timeout(&config.timeout)?;
        let identity_header = parse_identity_header(config.identity_header.as_deref())?;

        Ok(Self {
            client: Client::new(),
            answer_url,
            timeout,
            identity_header,
        })
    }

    /// URL the answer is fetched from
    pub const fn answer_url(&self) -> &Url {
        &self.answer_url
    }
}

#[async_trait]
impl AnswerSource for HttpAnswerSource {
    async fn fetch_answer(&self, query: &AnswerQuery, context: &RequestContext) -> Result<String, ChatError> {
        tracing::debug!(url = %self.answer_url, chat_id = ?query.chat_id, files = query.files.len(), "requesting answer");

        let mut builder = self
            .client
            .post(self.answer_url.clone())
            .timeout(self.timeout)
            .json(query);

        if let Some(header) = &self.identity_header
            && let Some(client_id) = context.client_id()
        {
            builder = builder.header(header, client_id);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(url = %self.answer_url, error = %e, "answer source request failed");
            ChatError::from_reqwest(&e)
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(url = %self.answer_url, status = %status, "answer source returned error");
            return Err(ChatError::UpstreamUnavailable(format!("answer source returned {status}: {body}")));
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::error!(url = %self.answer_url, error = %e, "failed to read answer body");
            ChatError::from_reqwest(&e)
        })?;

        decode_answer(&body)
    }
}

/// Extract the answer text from an answer source response body
///
/// The body must be a JSON object whose `result` field is a string.
/// Anything else is treated as an unavailable upstream.
pub fn decode_answer(body: &[u8]) -> Result<String, ChatError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| ChatError::UpstreamUnavailable(format!("answer body is not JSON: {e}")))?;

    match value.get("result") {
        Some(serde_json::Value::String(result)) => Ok(result.clone()),
        Some(other) => Err(ChatError::UpstreamUnavailable(format!(
            "answer `result` is not a string: found {}",
            json_kind(other)
        ))),
        None => Err(ChatError::UpstreamUnavailable("answer body has no `result` field".to_owned())),
    }
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

pub(crate) fn parse_timeout(s: &str) -> Result<Duration, ChatError> {
    duration_str::parse(s).map_err(|e| ChatError::Internal(anyhow::anyhow!("invalid upstream timeout '{s}': {e}")))
}

pub(crate) fn parse_identity_header(name: Option<&str>) -> Result<Option<HeaderName>, ChatError> {
    name.map(|name| {
        HeaderName::try_from(name.trim())
            .map_err(|e| ChatError::Internal(anyhow::anyhow!("invalid identity header '{name}': {e}")))
    })
    .transpose()
}
