use serde::Deserialize;
use url::Url;

/// Chat configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// Reject chat turns that carry no client identity
    #[serde(default)]
    pub require_identity: bool,
    /// Answer source connection settings
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Delays applied while emitting a simulated stream
    #[serde(default)]
    pub pacing: PacingConfig,
}

/// Connection settings for the answer source
///
/// `host` carries the scheme (e.g. `http://localhost`) and `port` is kept
/// separate, matching how the deployment environment provides them.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Scheme and host of the answer source
    #[serde(default)]
    pub host: String,
    /// Port of the answer source
    #[serde(default)]
    pub port: String,
    /// Path answering with a complete JSON `result`
    #[serde(default = "default_answer_path")]
    pub answer_path: String,
    /// Path answering with a server-sent event stream
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
    /// Timeout for the complete answer round-trip (e.g. "30s")
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// Forward the caller's client ID to the answer source in this header
    #[serde(default)]
    pub identity_header: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: String::new(),
            answer_path: default_answer_path(),
            stream_path: default_stream_path(),
            timeout: default_timeout(),
            identity_header: None,
        }
    }
}

impl UpstreamConfig {
    /// Base URL assembled from `host` and `port`
    ///
    /// # Errors
    ///
    /// Returns an error if either part is missing or the pair does not
    /// form a valid URL
    pub fn base_url(&self) -> anyhow::Result<Url> {
        let host = self.host.trim().trim_end_matches('/');
        let port = self.port.trim();

        if host.is_empty() {
            anyhow::bail!("chat.upstream.host must be set");
        }
        if port.is_empty() {
            anyhow::bail!("chat.upstream.port must be set");
        }

        let url = Url::parse(&format!("{host}:{port}"))
            .map_err(|e| anyhow::anyhow!("invalid answer source address '{host}:{port}': {e}"))?;

        if url.cannot_be_a_base() || url.host_str().is_none() {
            anyhow::bail!("answer source address '{host}:{port}' has no host");
        }

        Ok(url)
    }

    /// Full URL of the complete-answer endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid
    pub fn answer_url(&self) -> anyhow::Result<Url> {
        join_path(&self.base_url()?, &self.answer_path)
    }

    /// Full URL of the event-stream endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid
    pub fn stream_url(&self) -> anyhow::Result<Url> {
        join_path(&self.base_url()?, &self.stream_path)
    }
}

/// Delays applied while emitting a simulated stream
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PacingConfig {
    /// Delay before a token of at most `long_token_threshold` characters
    #[serde(default = "default_short_delay")]
    pub short_delay: String,
    /// Delay before a token longer than `long_token_threshold` characters
    #[serde(default = "default_long_delay")]
    pub long_delay: String,
    /// Character count above which a token uses `long_delay`
    #[serde(default = "default_long_token_threshold")]
    pub long_token_threshold: usize,
    /// Delay between the completion chunk and closing the stream
    #[serde(default = "default_close_delay")]
    pub close_delay: String,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            short_delay: default_short_delay(),
            long_delay: default_long_delay(),
            long_token_threshold: default_long_token_threshold(),
            close_delay: default_close_delay(),
        }
    }
}

fn join_path(base: &Url, path: &str) -> anyhow::Result<Url> {
    if !path.starts_with('/') {
        anyhow::bail!("answer source path '{path}' must start with '/'");
    }

    base.join(path)
        .map_err(|e| anyhow::anyhow!("invalid answer source path '{path}': {e}"))
}

fn default_answer_path() -> String {
    "/chat".to_string()
}

fn default_stream_path() -> String {
    "/chat/stream".to_string()
}

fn default_timeout() -> String {
    "30s".to_string()
}

fn default_short_delay() -> String {
    "60ms".to_string()
}

fn default_long_delay() -> String {
    "90ms".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_long_token_threshold() -> usize {
    10
}

fn default_close_delay() -> String {
    "100ms".to_string()
}
