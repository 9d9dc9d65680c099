//! Data types for conversations and the chat backend wire format.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Role type for a transcript entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User role.
    User,

    /// Assistant role.
    Assistant,
}

/// A single entry in a conversation transcript.
///
/// The assistant entry at the end of the transcript is the only entry that
/// gets mutated while a response is streaming; everything else is immutable
/// once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Client-generated identifier, unique within one transcript.
    pub id: u64,

    /// Who authored this entry.
    pub role: MessageRole,

    /// The text of the entry. Append-only while streaming.
    pub content: String,

    /// When the entry was created, client-side.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,
}

impl ChatMessage {
    /// Create a new user message with the current timestamp.
    pub fn user(id: u64, content: impl Into<String>) -> Self {
        Self {
            id,
            role: MessageRole::User,
            content: content.into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Create a new, empty assistant message with the current timestamp.
    pub fn assistant_placeholder(id: u64) -> Self {
        Self {
            id,
            role: MessageRole::Assistant,
            content: String::new(),
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// A server-side chat session, as listed by `GET /session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Server-assigned identifier. Zero means "not yet created".
    pub id: u64,

    /// Server-generated title for the session.
    #[serde(default)]
    pub title: String,
}

/// One stored exchange from `GET /session/{id}`.
///
/// The server stores history as user/assistant pairs; the transcript expands
/// each row into two entries, user first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMessage {
    /// Server-assigned row identifier.
    pub id: u64,

    /// The user's side of the exchange.
    pub user_message: String,

    /// The assistant's side of the exchange.
    pub ai_message: String,
}

/// Request body for `POST /chat/sse`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's question.
    pub question: String,

    /// The session to continue, or zero to start a new one.
    pub session_id: u64,
}

/// Response body for `POST /login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    /// The bearer token to present on subsequent calls.
    pub access_token: String,

    /// The token scheme, typically `bearer`.
    pub token_type: String,
}
