//! One request/response exchange with the completion endpoint, reconciled
//! into the conversation's message sequence.
//!
//! The exchange is a small state machine: `Idle` accepts a submission,
//! `AwaitingConversation` resolves (or creates) the target conversation and
//! appends the user message plus an empty assistant placeholder as two
//! discrete updates, `Streaming` folds deltas into the placeholder, and
//! `Settled` collapses straight back to `Idle`. Only one exchange may run
//! per driver; a submission while busy is ignored, never queued.

use tokio::sync::mpsc;

use crate::history::{ConversationPatch, ConversationSync, Message, Role, derive_title};
use crate::services::config::AiConfig;

use super::stream;
use super::types::{ChatMessage, StreamEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    AwaitingConversation,
    Streaming,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Completed,
    Rejected,
}

pub struct ExchangeDriver {
    config: AiConfig,
    http_client: reqwest::Client,
    state: ExchangeState,
}

impl ExchangeDriver {
    pub fn new(config: AiConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            http_client,
            state: ExchangeState::Idle,
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn is_generating(&self) -> bool {
        matches!(
            self.state,
            ExchangeState::AwaitingConversation | ExchangeState::Streaming
        )
    }

    /// Drive a full exchange. `render` receives each delta for display; the
    /// durable accumulation goes through the synchronizer.
    pub async fn submit(
        &mut self,
        sync: &mut ConversationSync,
        input: &str,
        mut render: impl FnMut(&str),
    ) -> SubmitOutcome {
        let input = input.trim();
        if input.is_empty() || self.state != ExchangeState::Idle {
            return SubmitOutcome::Rejected;
        }

        self.state = ExchangeState::AwaitingConversation;
        let Some(prepared) = begin_exchange(sync, input).await else {
            self.state = ExchangeState::Idle;
            return SubmitOutcome::Rejected;
        };

        self.state = ExchangeState::Streaming;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(stream::run_chat_stream(
            self.config.clone(),
            prepared.request_messages,
            self.http_client.clone(),
            events_tx,
        ));

        settle_stream(sync, &prepared.conversation_id, events_rx, &mut render).await;
        let _ = task.await;

        // The generating indicator clears on Settled regardless of outcome.
        self.state = ExchangeState::Settled;
        self.state = ExchangeState::Idle;
        SubmitOutcome::Completed
    }
}

struct PreparedExchange {
    conversation_id: String,
    request_messages: Vec<ChatMessage>,
}

/// Resolve the target conversation and append the user message followed by
/// the empty assistant placeholder — two discrete updates, so the user
/// message is durable even if the stream fails. When the user message was
/// the conversation's first, the title is derived from it and committed.
async fn begin_exchange(sync: &mut ConversationSync, input: &str) -> Option<PreparedExchange> {
    let conversation_id = match sync.selected_id() {
        Some(id) => id.to_string(),
        None => match sync.create(None).await {
            Ok(id) => id,
            Err(err) => {
                log::error!("Conversation create failed: {}", err);
                return None;
            }
        },
    };

    let existing = sync.get(&conversation_id)?.messages.clone();
    let is_first_message = existing.is_empty();

    let mut with_user = existing;
    with_user.push(Message::user(input));
    sync.update(
        &conversation_id,
        ConversationPatch::messages(with_user.clone()),
    )
    .await;

    let mut with_placeholder = with_user.clone();
    with_placeholder.push(Message::assistant_placeholder());
    sync.update(
        &conversation_id,
        ConversationPatch::messages(with_placeholder),
    )
    .await;

    if is_first_message {
        sync.update(
            &conversation_id,
            ConversationPatch::title(derive_title(input)),
        )
        .await;
    }

    // The placeholder is excluded from the request.
    let request_messages = with_user
        .iter()
        .map(|m| ChatMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        })
        .collect();

    Some(PreparedExchange {
        conversation_id,
        request_messages,
    })
}

/// Drain stream events in arrival order. Each delta produces a new message
/// list with the placeholder content extended and republishes it; a stream
/// error keeps whatever was accumulated.
async fn settle_stream(
    sync: &mut ConversationSync,
    conversation_id: &str,
    mut events: mpsc::UnboundedReceiver<StreamEvent>,
    render: &mut impl FnMut(&str),
) {
    let mut accumulated = String::new();

    while let Some(event) = events.recv().await {
        match event {
            StreamEvent::Delta(delta) => {
                accumulated.push_str(&delta);
                let Some(conversation) = sync.get(conversation_id) else {
                    break;
                };
                let messages = extend_placeholder(&conversation.messages, &accumulated);
                sync.update(conversation_id, ConversationPatch::messages(messages))
                    .await;
                render(&delta);
            }
            StreamEvent::Done => break,
            StreamEvent::Error(err) => {
                log::error!("Chat stream failed: {}", err);
                break;
            }
        }
    }
}

/// New message list with the trailing assistant placeholder carrying the
/// accumulated content. Never mutates the input.
fn extend_placeholder(messages: &[Message], accumulated: &str) -> Vec<Message> {
    let mut next = messages.to_vec();
    if let Some(last) = next.last_mut() {
        if last.role == Role::Assistant {
            last.content = accumulated.to_string();
        }
    }
    next
}
