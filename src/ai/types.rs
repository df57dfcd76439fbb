use serde::{Deserialize, Serialize};

/// Message form sent to the completion endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Events forwarded from the stream task to the exchange driver. The mpsc
/// channel preserves arrival order, which is the order chunks must be
/// applied in.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Delta(String),
    Done,
    Error(String),
}

/// BYOT stream chunk; only the content delta matters here, unknown fields
/// from OpenAI-compatible vendors are ignored.
#[derive(Debug, Deserialize)]
pub(super) struct ByotChatCompletionStreamResponse {
    pub(super) choices: Vec<ByotChatChoiceStream>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ByotChatChoiceStream {
    pub(super) delta: ByotChatCompletionStreamDelta,
}

#[derive(Debug, Deserialize)]
pub(super) struct ByotChatCompletionStreamDelta {
    pub(super) content: Option<String>,
}
