use counsel_core::HttpError;
use http::StatusCode;
use thiserror::Error;

/// Errors that can end a chat turn before any chunk is sent
#[derive(Debug, Error)]
pub enum ChatError {
    /// Client sent a malformed or invalid request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Request carries no client identity while one is required
    #[error("authentication required")]
    Unauthorized,

    /// Answer source failed, refused, or returned an unusable payload
    #[error("answer source unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Answer source did not respond within the configured timeout
    #[error("answer source timed out")]
    UpstreamTimeout,

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ChatError {
    /// Short outcome label for metrics
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::Unauthorized => "unauthorized",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::UpstreamTimeout => "upstream_timeout",
            Self::Internal(_) => "internal",
        }
    }

    pub(crate) fn from_reqwest(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::UpstreamTimeout
        } else {
            Self::UpstreamUnavailable(error.to_string())
        }
    }
}

impl HttpError for ChatError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::Unauthorized => "authentication_error",
            Self::UpstreamUnavailable(_) | Self::UpstreamTimeout => "upstream_error",
            Self::Internal(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::InvalidRequest(message) => message.clone(),
            Self::UpstreamUnavailable(_) => "answer source unavailable".to_owned(),
            Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_detail_is_not_exposed() {
        let error = ChatError::UpstreamUnavailable("connection refused to 10.0.0.5".to_owned());
        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(error.client_message(), "answer source unavailable");
        assert!(error.to_string().contains("10.0.0.5"));
    }

    #[test]
    fn timeout_maps_to_gateway_timeout() {
        let error = ChatError::UpstreamTimeout;
        assert_eq!(error.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(error.error_type(), "upstream_error");
    }

    #[test]
    fn invalid_request_keeps_message() {
        let error = ChatError::InvalidRequest("messages must not be empty".to_owned());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.client_message(), "messages must not be empty");
        assert_eq!(error.to_string(), "invalid request: messages must not be empty");
    }
}
