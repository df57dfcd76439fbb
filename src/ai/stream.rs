//! Streaming completion driver.
//!
//! Uses `async-openai` BYOT ("bring your own types") so OpenAI-compatible
//! vendors with extra delta fields still deserialize. Each content delta is
//! forwarded through the channel in arrival order, followed by a single
//! `Done` or `Error`. Failures are terminal; nothing is retried.

use async_openai::{Client, config::OpenAIConfig};
use futures_util::StreamExt;
use tokio::sync::mpsc::UnboundedSender;

use crate::services::config::AiConfig;

use super::types::{ByotChatCompletionStreamResponse, ChatMessage, StreamEvent};

pub(super) fn build_request(config: &AiConfig, messages: &[ChatMessage]) -> serde_json::Value {
    serde_json::json!({
        "model": config.model,
        "messages": messages,
        "stream": true,
        "max_tokens": config.max_tokens,
    })
}

pub(super) async fn run_chat_stream(
    config: AiConfig,
    messages: Vec<ChatMessage>,
    http_client: reqwest::Client,
    events: UnboundedSender<StreamEvent>,
) {
    let openai_config = OpenAIConfig::new()
        .with_api_base(config.base_url.clone())
        .with_api_key(config.api_key.clone());
    let client = Client::with_config(openai_config).with_http_client(http_client);

    let request = build_request(&config, &messages);

    let mut stream = match client
        .chat()
        .create_stream_byot::<_, ByotChatCompletionStreamResponse>(&request)
        .await
    {
        Ok(stream) => stream,
        Err(err) => {
            let _ = events.send(StreamEvent::Error(err.to_string()));
            return;
        }
    };

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                let _ = events.send(StreamEvent::Error(err.to_string()));
                return;
            }
        };

        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                if !content.is_empty() {
                    let _ = events.send(StreamEvent::Delta(content));
                }
            }
        }
    }

    let _ = events.send(StreamEvent::Done);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_shape() {
        let config = AiConfig {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 512,
            ..AiConfig::default()
        };

        let messages = vec![
            ChatMessage {
                role: "user".to_string(),
                content: "hello".to_string(),
            },
            ChatMessage {
                role: "assistant".to_string(),
                content: "hi".to_string(),
            },
        ];

        let request = build_request(&config, &messages);
        assert_eq!(request["model"], "gpt-4o-mini");
        assert_eq!(request["stream"], true);
        assert_eq!(request["max_tokens"], 512);
        assert_eq!(request["messages"][0]["role"], "user");
        assert_eq!(request["messages"][1]["content"], "hi");
    }
}
