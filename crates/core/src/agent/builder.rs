use std::sync::Arc;
use std::time::Duration;

use sidekick_model::{ModelProvider, ToolCallRequest};

use super::{Agent, ToolCallFn};
use crate::model_client::{ModelClient, TranscriptFn};
use crate::tool::{AnyTool, Tool, ToolObject};

/// [`Agent`] builder.
pub struct AgentBuilder {
    pub(crate) model_client: ModelClient,
    pub(crate) system_prompt: Option<String>,
    pub(crate) tools: Vec<Box<dyn ToolObject>>,
    pub(crate) on_transcript: Option<TranscriptFn>,
    pub(crate) on_tool_call: Option<ToolCallFn>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            system_prompt: None,
            tools: vec![],
            on_transcript: None,
            on_tool_call: None,
        }
    }

    /// Sets the system prompt, which stays at the head of the conversation.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        let tool = Box::new(AnyTool(tool));
        self.tools.push(tool);
        self
    }

    /// Sets how long rate-limited model requests are retried.
    #[inline]
    pub fn with_retry_budget(mut self, budget: Duration) -> Self {
        self.model_client = self.model_client.with_retry_budget(budget);
        self
    }

    /// Attaches a callback receiving the assistant text as it streams.
    ///
    /// Rate-limited requests are only retried before any text has been
    /// streamed, so the callback never sees the same delta twice.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.on_transcript = Some(Arc::new(on_transcript));
        self
    }

    /// Attaches a callback to be invoked right before a tool is dispatched.
    #[inline]
    pub fn on_tool_call(
        mut self,
        on_tool_call: impl Fn(&ToolCallRequest) + Send + Sync + 'static,
    ) -> Self {
        self.on_tool_call = Some(Arc::new(on_tool_call));
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> Agent {
        Agent::from_builder(self)
    }
}
