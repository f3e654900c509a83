//! Incremental delivery of a complete answer

use std::sync::Arc;
use std::time::Instant;

use counsel_core::RequestContext;

use crate::emitter::{ChunkStream, Emission, Phase};
use crate::error::ChatError;
use crate::metrics::{ChatMetrics, ROUTE_SIMULATED};
use crate::pacing::Pacing;
use crate::source::AnswerSource;
use crate::types::AnswerRequest;

/// Replays a complete upstream answer as a paced chunk stream
pub struct Simulator {
    source: Arc<dyn AnswerSource>,
    pacing: Pacing,
    metrics: ChatMetrics,
}

impl Simulator {
    /// Create a simulator over `source`
    pub fn new(source: Arc<dyn AnswerSource>, pacing: Pacing) -> Self {
        Self {
            source,
            pacing,
            metrics: ChatMetrics::default(),
        }
    }

    /// Timing policy used for new streams
    pub const fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// Start a chat turn
    ///
    /// Resolves the full answer first; any failure is returned here and no
    /// stream is created. On success the returned stream is already being
    /// fed by its own emission task.
    pub async fn initiate(&self, request: AnswerRequest, context: &RequestContext) -> Result<ChunkStream, ChatError> {
        let query = request.into_query()?;

        tracing::debug!(phase = %Phase::FetchingAnswer, chat_id = ?query.chat_id, "resolving answer");

        let start = Instant::now();
        let answer = match self.source.fetch_answer(&query, context).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::debug!(phase = %Phase::Errored, error = %e, "answer unavailable");
                self.metrics.record_upstream(ROUTE_SIMULATED, start, e.outcome());
                return Err(e);
            }
        };
        self.metrics.record_upstream(ROUTE_SIMULATED, start, "ok");

        let emission = Emission::new(&answer);
        tracing::info!(
            chat_id = ?query.chat_id,
            characters = answer.chars().count(),
            tokens = emission.tokens().len(),
            "streaming answer"
        );

        let metrics = self.metrics.clone();
        let started = Instant::now();
        Ok(ChunkStream::spawn(emission, self.pacing, move |outcome| {
            metrics.record_emission(started, outcome);
        }))
    }
}
