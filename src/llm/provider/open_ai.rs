use futures::StreamExt;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::{
    CHANNEL_BUFFER_DEFAULT,
    error::{SbResult, StockbatchError},
    llm::{ChatCompletionEvent, ChatCompletionStream, provider::*},
    utils::net::join_url,
};

pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

impl ChatProvider for OpenAiProvider {
    async fn chat_completion_stream(
        &self,
        messages: &[ChatMessage],
        options: &ChatCompletionOptions,
    ) -> SbResult<ChatCompletionStream> {
        let request_url = join_url(&self.base_url, "/chat/completions")?;

        let request_body = json!({
            "model": self.model,
            "messages": messages.iter().map(chat_message_to_json_value).collect::<Vec<_>>(),
            "temperature": options.temperature,
            "stream": true,
        });

        let response = reqwest::Client::new()
            .post(request_url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StockbatchError::HttpStatusError(format!(
                "{} {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER_DEFAULT);

        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();

            // An SSE event may split across chunk boundaries, carry the tail
            // until its newline arrives
            let mut carry = String::new();

            'chunks: while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        let _ = sender.send(ChatCompletionEvent::Error(err.into())).await;
                        break;
                    }
                };
                carry.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(offset) = carry.find('\n') {
                    let line: String = carry.drain(..=offset).collect();

                    let Some(data) = line.trim().strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim_start();
                    if data == "[DONE]" {
                        break 'chunks;
                    }

                    for event in parse_sse_data(data) {
                        if sender.send(event).await.is_err() {
                            break 'chunks;
                        }
                    }
                }
            }
        });

        Ok(ChatCompletionStream::new(receiver))
    }
}

fn parse_sse_data(data: &str) -> Vec<ChatCompletionEvent> {
    let json: Value = match serde_json::from_str(data) {
        Ok(json) => json,
        Err(err) => return vec![ChatCompletionEvent::Error(err.into())],
    };

    let delta = &json["choices"][0]["delta"];

    let mut events = vec![];
    for (field, event_of) in [
        (
            "content",
            ChatCompletionEvent::Content as fn(String) -> ChatCompletionEvent,
        ),
        (
            "reasoning_content",
            ChatCompletionEvent::ReasoningContent as fn(String) -> ChatCompletionEvent,
        ),
    ] {
        if let Some(text) = delta[field].as_str().filter(|s| !s.is_empty()) {
            events.push(event_of(text.to_string()));
        }
    }

    events
}

fn chat_message_to_json_value(message: &ChatMessage) -> Value {
    let role = match message.role {
        Role::Bot => "assistant",
        Role::System => "system",
        Role::User => "user",
    };

    json!({
        "role": role,
        "content": message.content,
    })
}
