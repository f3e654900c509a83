//! Line framing for the simulated stream
//!
//! Each chunk is one UTF-8 line, `<prefix>:<json>\n`. Text chunks use the
//! `0` prefix with a JSON string payload; the completion chunk uses `d`
//! with a JSON object payload.

use serde::{Deserialize, Serialize};

const TEXT_PREFIX: &str = "0";
const DONE_PREFIX: &str = "d";

/// One unit of the outbound stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// A single token of the answer
    Text(String),
    /// Terminal completion signal
    Done(Completion),
}

impl Chunk {
    /// Discriminator written before the payload
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::Text(_) => TEXT_PREFIX,
            Self::Done(_) => DONE_PREFIX,
        }
    }

    /// Encode as a newline-terminated line
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let payload = match self {
            Self::Text(text) => serde_json::to_string(text)?,
            Self::Done(completion) => serde_json::to_string(completion)?,
        };

        Ok(format!("{}:{payload}\n", self.prefix()))
    }

    /// Decode one line, with or without its trailing newline
    ///
    /// Returns `None` for an unknown prefix or a payload that does not
    /// match it.
    pub fn decode(line: &str) -> Option<Self> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let (prefix, payload) = line.split_once(':')?;

        match prefix {
            TEXT_PREFIX => serde_json::from_str(payload).ok().map(Self::Text),
            DONE_PREFIX => serde_json::from_str(payload).ok().map(Self::Done),
            _ => None,
        }
    }
}

/// Payload of the completion chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl Completion {
    /// Normal end of an answer
    pub const fn stop(usage: Usage) -> Self {
        Self {
            finish_reason: FinishReason::Stop,
            usage,
        }
    }
}

/// Why emission ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
}

/// Usage estimate reported with the completion chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Roughly four characters per token of the answer
    pub prompt_tokens: usize,
    /// Number of text chunks emitted
    pub completion_tokens: usize,
}

impl Usage {
    /// Estimate usage for an answer split into `token_count` tokens
    pub fn estimate(answer: &str, token_count: usize) -> Self {
        Self {
            prompt_tokens: answer.chars().count().div_ceil(4),
            completion_tokens: token_count,
        }
    }
}
