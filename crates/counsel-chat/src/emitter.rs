//! Paced emission of a tokenized answer
//!
//! Each stream owns one spawned task. The task hands encoded lines to the
//! response body through a channel of capacity one and races every delay
//! against a cancellation token. Dropping the [`ChunkStream`] cancels the
//! token, so a disconnected consumer stops the task at its next await
//! point and no timer outlives the response.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::Instrument;

use crate::chunk::{Chunk, Completion, Usage};
use crate::pacing::Pacing;
use crate::tokenize::tokenize;

/// Lifecycle of a single chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Idle,
    FetchingAnswer,
    Emitting,
    Completing,
    Closed,
    Errored,
}

/// How an emission task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    /// Every token and the completion chunk were delivered
    Completed { tokens: usize },
    /// The consumer went away after `emitted` text chunks
    Cancelled { emitted: usize },
    /// A chunk could not be encoded after `emitted` text chunks
    Failed { emitted: usize },
}

impl EmitOutcome {
    /// Short outcome label for metrics
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Cancelled { .. } => "cancelled",
            Self::Failed { .. } => "failed",
        }
    }

    /// Number of text chunks handed to the consumer
    pub const fn emitted(&self) -> usize {
        match *self {
            Self::Completed { tokens } => tokens,
            Self::Cancelled { emitted } | Self::Failed { emitted } => emitted,
        }
    }
}

/// A tokenized answer ready to be emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    tokens: Vec<String>,
    usage: Usage,
}

impl Emission {
    /// Tokenize `answer` and compute its usage estimate
    pub fn new(answer: &str) -> Self {
        let tokens: Vec<String> = tokenize(answer).into_iter().map(str::to_owned).collect();
        let usage = Usage::estimate(answer, tokens.len());

        Self { tokens, usage }
    }

    /// Tokens in emission order
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Usage reported by the completion chunk
    pub const fn usage(&self) -> Usage {
        self.usage
    }
}

/// Stream of encoded chunk lines for one chat turn
///
/// Yields `0:` lines in answer order, then exactly one `d:` line, then
/// ends once the close delay has passed.
pub struct ChunkStream {
    receiver: mpsc::Receiver<String>,
    _cancel_on_drop: DropGuard,
}

impl ChunkStream {
    /// Spawn the emission task on the current tokio runtime
    ///
    /// `on_finish` runs inside the task once it ends, with the outcome.
    pub fn spawn<F>(emission: Emission, pacing: Pacing, on_finish: F) -> Self
    where
        F: FnOnce(EmitOutcome) + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        tokio::spawn(
            async move {
                let outcome = emit(emission, pacing, sender, task_cancel).await;
                on_finish(outcome);
            }
            .instrument(tracing::Span::current()),
        );

        Self {
            receiver,
            _cancel_on_drop: cancel.drop_guard(),
        }
    }
}

impl Stream for ChunkStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl std::fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStream").finish_non_exhaustive()
    }
}

enum Halt {
    Cancelled,
    Encode(serde_json::Error),
}

/// Run the emit loop until completion, cancellation, or an encode failure
async fn emit(
    emission: Emission,
    pacing: Pacing,
    sender: mpsc::Sender<String>,
    cancel: CancellationToken,
) -> EmitOutcome {
    let total = emission.tokens.len();
    tracing::debug!(phase = %Phase::Emitting, tokens = total, "emitting answer");

    for (cursor, token) in emission.tokens.into_iter().enumerate() {
        let delay = pacing.delay_for(&token);

        let delivered = match pause(delay, &cancel).await {
            Ok(()) => deliver(&sender, &cancel, &Chunk::Text(token)).await,
            Err(halt) => Err(halt),
        };

        if let Err(halt) = delivered {
            return halted(halt, cursor);
        }
    }

    tracing::debug!(phase = %Phase::Completing, tokens = total, "sending completion");

    let done = Chunk::Done(Completion::stop(emission.usage));
    if let Err(halt) = deliver(&sender, &cancel, &done).await {
        return halted(halt, total);
    }

    // All chunks are out; an early disconnect here only shortens the wait
    let _ = pause(pacing.close_delay, &cancel).await;
    drop(sender);

    tracing::debug!(phase = %Phase::Closed, tokens = total, "stream closed");
    EmitOutcome::Completed { tokens: total }
}

fn halted(halt: Halt, emitted: usize) -> EmitOutcome {
    match halt {
        Halt::Cancelled => {
            tracing::debug!(phase = %Phase::Closed, emitted, "consumer disconnected");
            EmitOutcome::Cancelled { emitted }
        }
        Halt::Encode(e) => {
            tracing::error!(phase = %Phase::Errored, emitted, error = %e, "failed to encode chunk");
            EmitOutcome::Failed { emitted }
        }
    }
}

/// Sleep for `delay` unless cancelled first
async fn pause(delay: Duration, cancel: &CancellationToken) -> Result<(), Halt> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Halt::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Encode `chunk` and hand it to the consumer once it has room
async fn deliver(sender: &mpsc::Sender<String>, cancel: &CancellationToken, chunk: &Chunk) -> Result<(), Halt> {
    let line = chunk.encode().map_err(Halt::Encode)?;

    let permit = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(Halt::Cancelled),
        permit = sender.reserve() => permit.map_err(|_| Halt::Cancelled)?,
    };

    permit.send(line);
    Ok(())
}
