//! Wire types for chat turns

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One message of the running conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Reference to an uploaded file attached to a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReference {
    /// Original file name
    pub name: String,
    /// MIME type reported at upload
    pub content_type: String,
    /// Object storage URL
    pub url: String,
}

/// Inbound chat turn sent by the front end
#[derive(Debug, Clone, Deserialize)]
pub struct AnswerRequest {
    /// Conversation so far; the last entry is the current question
    pub messages: Vec<ChatMessage>,
    /// Conversation identifier, absent for a conversation not yet saved
    #[serde(default)]
    pub chat_id: Option<String>,
    /// Files attached to the current question
    #[serde(default)]
    pub files: Vec<FileReference>,
}

impl AnswerRequest {
    /// Reduce the turn to the query the answer source understands
    ///
    /// Only the last message is sent; the answer source keeps its own
    /// history per `chat_id`.
    pub fn into_query(mut self) -> Result<AnswerQuery, ChatError> {
        let last = self
            .messages
            .pop()
            .ok_or_else(|| ChatError::InvalidRequest("messages must not be empty".to_owned()))?;

        Ok(AnswerQuery {
            question: last.content,
            chat_id: self.chat_id,
            files: self.files,
        })
    }
}

/// Body posted to the answer source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerQuery {
    pub question: String,
    pub chat_id: Option<String>,
    pub files: Vec<FileReference>,
}
