use std::time::Instant;

use counsel_telemetry::metrics::{
    ATTR_OUTCOME, ATTR_ROUTE, CHAT_REQUEST_COUNT, CHAT_STREAM_DURATION, CHAT_STREAM_TOKENS, CHAT_UPSTREAM_DURATION,
    record_duration,
};
use counsel_telemetry::{Counter, Histogram, KeyValue, Meter};

use crate::emitter::EmitOutcome;

/// Route labels
pub const ROUTE_SIMULATED: &str = "simulated";
pub const ROUTE_RELAY: &str = "relay";

/// Chat instruments, cheap to clone into emission tasks
#[derive(Clone)]
pub struct ChatMetrics {
    requests: Counter<u64>,
    upstream_duration: Histogram<f64>,
    stream_tokens: Counter<u64>,
    stream_duration: Histogram<f64>,
}

impl ChatMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            requests: meter
                .u64_counter(CHAT_REQUEST_COUNT)
                .with_description("Chat turns by route and outcome")
                .build(),
            upstream_duration: meter
                .f64_histogram(CHAT_UPSTREAM_DURATION)
                .with_description("Time until the answer source responded")
                .with_unit("s")
                .build(),
            stream_tokens: meter
                .u64_counter(CHAT_STREAM_TOKENS)
                .with_description("Text chunks delivered to consumers")
                .build(),
            stream_duration: meter
                .f64_histogram(CHAT_STREAM_DURATION)
                .with_description("Time from first chunk scheduled to stream end")
                .with_unit("s")
                .build(),
        }
    }

    pub fn record_request(&self, route: &'static str, outcome: &'static str) {
        self.requests
            .add(1, &[KeyValue::new(ATTR_ROUTE, route), KeyValue::new(ATTR_OUTCOME, outcome)]);
    }

    pub fn record_upstream(&self, route: &'static str, start: Instant, outcome: &'static str) {
        record_duration(&self.upstream_duration, start, &[
            KeyValue::new(ATTR_ROUTE, route),
            KeyValue::new(ATTR_OUTCOME, outcome),
        ]);
    }

    pub fn record_emission(&self, start: Instant, outcome: EmitOutcome) {
        let attributes = [KeyValue::new(ATTR_OUTCOME, outcome.label())];
        self.stream_tokens
            .add(u64::try_from(outcome.emitted()).unwrap_or(u64::MAX), &attributes);
        record_duration(&self.stream_duration, start, &attributes);
    }
}

impl Default for ChatMetrics {
    fn default() -> Self {
        Self::new(&counsel_telemetry::meter())
    }
}
