//! Chat streaming for Counsel
//!
//! Fetches a complete answer from the answer source and replays it to the
//! caller as a paced, newline-delimited chunk stream. A second route relays
//! the answer source's own event stream, re-framed for the front end.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod chunk;
pub mod emitter;
pub mod error;
#[cfg(feature = "http")]
pub mod handler;
mod metrics;
pub mod pacing;
pub mod relay;
pub mod simulator;
pub mod source;
pub mod state;
pub mod tokenize;
pub mod types;

pub use chunk::{Chunk, Completion, FinishReason, Usage};
pub use emitter::{ChunkStream, EmitOutcome, Emission, Phase};
pub use error::ChatError;
#[cfg(feature = "http")]
pub use handler::chat_router;
pub use pacing::Pacing;
pub use relay::{EventRelay, RelayEvent, RelayFrame, RelayStream};
pub use simulator::Simulator;
pub use source::{AnswerSource, HttpAnswerSource};
pub use state::ChatState;
pub use tokenize::tokenize;
pub use types::{AnswerQuery, AnswerRequest, ChatMessage, FileReference, Role};
