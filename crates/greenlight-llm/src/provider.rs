//! LLM provider trait.
//!
//! Defines the interface the conversation loop drives. Implementors
//! provide access to language models with streaming support.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::error::LlmResult;
use crate::types::{LlmToolDefinition, Message, StreamEvent};

/// Type alias for boxed streams.
pub type StreamBox = Pin<Box<dyn Stream<Item = LlmResult<StreamEvent>> + Send>>;

/// LLM provider trait.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Get the model being used.
    fn model(&self) -> &str;

    /// Stream a completion.
    ///
    /// Returns a stream of events as the model generates output. The
    /// caller suspends at each read; nothing in this contract blocks on
    /// human input.
    async fn stream(
        &self,
        messages: &[Message],
        tools: &[LlmToolDefinition],
        system: &str,
    ) -> LlmResult<StreamBox>;
}

/// Blanket implementation allowing `Box<dyn LlmProvider>` to be used as
/// a type parameter wherever `P: LlmProvider` is required.
#[async_trait]
impl LlmProvider for Box<dyn LlmProvider> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn model(&self) -> &str {
        (**self).model()
    }

    async fn stream(
        &self,
        messages: &[Message],
        tools: &[LlmToolDefinition],
        system: &str,
    ) -> LlmResult<StreamBox> {
        (**self).stream(messages, tools, system).await
    }
}
