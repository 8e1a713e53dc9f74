use crate::{
    error::SbResult,
    llm::{ChatCompletionEvent, ChatCompletionOptions, ChatCompletionStream, ChatMessage, Role},
};

pub mod open_ai;

pub trait ChatProvider: Sync {
    fn chat_completion_stream(
        &self,
        messages: &[ChatMessage],
        options: &ChatCompletionOptions,
    ) -> impl std::future::Future<Output = SbResult<ChatCompletionStream>> + Send;

    /// Drain the event stream into a single bot message
    fn chat_completion(
        &self,
        messages: &[ChatMessage],
        options: &ChatCompletionOptions,
    ) -> impl std::future::Future<Output = SbResult<ChatMessage>> + Send {
        async move {
            let mut content = String::new();
            let mut reasoning = String::new();

            let mut stream = self.chat_completion_stream(messages, options).await?;
            while let Some(event) = stream.next().await {
                match event {
                    ChatCompletionEvent::Content(delta) => content.push_str(&delta),
                    ChatCompletionEvent::ReasoningContent(delta) => reasoning.push_str(&delta),
                    ChatCompletionEvent::Error(err) => {
                        return Err(err);
                    }
                }
            }

            Ok(ChatMessage {
                role: Role::Bot,
                content,
                reasoning: (!reasoning.is_empty()).then_some(reasoning),
            })
        }
    }
}
