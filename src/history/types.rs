use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single chat message. Immutable once appended, except the in-flight
/// assistant placeholder whose content grows while a stream is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub role: Role,
    pub timestamp: u64,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: new_id("msg"),
            content: content.into(),
            role: Role::User,
            timestamp: now_ms(),
        }
    }

    /// Empty assistant message appended before streaming starts.
    pub fn assistant_placeholder() -> Self {
        Self {
            id: new_id("msg"),
            content: String::new(),
            role: Role::Assistant,
            timestamp: now_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Conversation {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id: new_id("conv"),
            user_id: user_id.into(),
            title: title.into(),
            messages: Vec::new(),
            created_at_ms: now,
            updated_at_ms: now,
        }
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// `{prefix}_{epoch ms, hex}_{12 random hex chars}` — time component plus
/// enough entropy that collisions are negligible.
pub(crate) fn new_id(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{:x}_{}", prefix, now_ms(), &suffix[..12])
}

/// Encode the message sequence as the single JSON text column the
/// conversations table stores it in.
pub(crate) fn encode_messages(messages: &[Message]) -> Result<String, StoreError> {
    serde_json::to_string(messages).map_err(StoreError::from)
}

pub(crate) fn decode_messages(blob: &str) -> Result<Vec<Message>, StoreError> {
    if blob.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(blob).map_err(StoreError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_shape() {
        let id = new_id("conv");
        assert!(id.starts_with("conv_"));
        let parts: Vec<&str> = id.splitn(3, '_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].len(), 12);
        assert_ne!(new_id("conv"), new_id("conv"));
    }

    #[test]
    fn test_messages_blob_roundtrip() {
        let messages = vec![
            Message::user("hello"),
            Message {
                id: new_id("msg"),
                content: "hi there".to_string(),
                role: Role::Assistant,
                timestamp: now_ms(),
            },
        ];

        let blob = encode_messages(&messages).unwrap();
        assert!(blob.contains("\"role\":\"user\""));
        assert!(blob.contains("\"role\":\"assistant\""));

        let decoded = decode_messages(&blob).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].content, "hello");
        assert_eq!(decoded[1].role, Role::Assistant);
    }

    #[test]
    fn test_empty_blob_decodes_to_empty_list() {
        assert!(decode_messages("").unwrap().is_empty());
        assert!(decode_messages("  ").unwrap().is_empty());
    }
}
