//! Axum route handlers for the chat endpoints

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json, Router, routing};
use counsel_core::{HttpError, RequestContext};
use futures_util::StreamExt;
use http::{HeaderName, HeaderValue, header};

use crate::emitter::ChunkStream;
use crate::error::ChatError;
use crate::relay::{RelayFrame, RelayStream};
use crate::state::ChatState;
use crate::types::AnswerRequest;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Build the chat router
pub fn chat_router(state: ChatState) -> Router {
    Router::new()
        .route("/api/chat", routing::post(chat))
        .route("/api/chat/stream", routing::post(chat_stream))
        .with_state(state)
}

/// Handle `POST /api/chat`
async fn chat(
    State(state): State<ChatState>,
    context: Option<Extension<RequestContext>>,
    request: Result<Json<AnswerRequest>, JsonRejection>,
) -> Response {
    let context = context.map_or_else(RequestContext::empty, |Extension(context)| context);

    let request = match request {
        Ok(Json(request)) => request,
        Err(rejection) => return error_response(&invalid_body(&rejection)),
    };

    match state.simulate(request, &context).await {
        Ok(stream) => chunk_stream_response(stream),
        Err(e) => error_response(&e),
    }
}

/// Handle `POST /api/chat/stream`
async fn chat_stream(
    State(state): State<ChatState>,
    context: Option<Extension<RequestContext>>,
    request: Result<Json<AnswerRequest>, JsonRejection>,
) -> Response {
    let context = context.map_or_else(RequestContext::empty, |Extension(context)| context);

    let request = match request {
        Ok(Json(request)) => request,
        Err(rejection) => return error_response(&invalid_body(&rejection)),
    };

    match state.relay(request, &context).await {
        Ok(stream) => relay_response(stream),
        Err(e) => error_response(&e),
    }
}

/// Newline-delimited chunk body
///
/// Dropping the body, for example when the client disconnects, drops the
/// stream and stops its emission task.
fn chunk_stream_response(stream: ChunkStream) -> Response {
    let body = Body::from_stream(stream.map(Ok::<_, Infallible>));

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (header::CONNECTION, HeaderValue::from_static("keep-alive")),
            (X_ACCEL_BUFFERING, HeaderValue::from_static("no")),
        ],
        body,
    )
        .into_response()
}

/// Server-sent event body for relayed frames
fn relay_response(stream: RelayStream) -> Response {
    let events = stream.map(|frame: RelayFrame| Ok::<_, Infallible>(Event::default().data(frame.data())));

    (
        [
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache, no-transform")),
            (X_ACCEL_BUFFERING, HeaderValue::from_static("no")),
        ],
        Sse::new(events).keep_alive(KeepAlive::default()),
    )
        .into_response()
}

fn invalid_body(rejection: &JsonRejection) -> ChatError {
    ChatError::InvalidRequest(rejection.body_text())
}

/// Convert a chat error to a JSON error response
fn error_response(error: &ChatError) -> Response {
    let status = error.status_code();

    if status.is_server_error() {
        tracing::warn!(status = %status, error = %error, "chat request failed");
    } else {
        tracing::debug!(status = %status, error = %error, "chat request rejected");
    }

    (status, Json(error.to_json_body())).into_response()
}
