//! Chat metric names and recording helpers

use std::time::Instant;

use opentelemetry::KeyValue;
use opentelemetry::metrics::Histogram;

/// Chat turns by route and outcome
pub const CHAT_REQUEST_COUNT: &str = "chat.request.count";
/// Seconds until the answer source responded
pub const CHAT_UPSTREAM_DURATION: &str = "chat.upstream.duration";
/// Text chunks delivered to consumers
pub const CHAT_STREAM_TOKENS: &str = "chat.stream.tokens";
/// Seconds an emission task ran
pub const CHAT_STREAM_DURATION: &str = "chat.stream.duration";

/// `simulated` or `relay`
pub const ATTR_ROUTE: &str = "chat.route";
pub const ATTR_OUTCOME: &str = "chat.outcome";

/// Record the seconds elapsed since `start`
pub fn record_duration(histogram: &Histogram<f64>, start: Instant, attributes: &[KeyValue]) {
    histogram.record(start.elapsed().as_secs_f64(), attributes);
}
