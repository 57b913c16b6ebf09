mod builder;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use sidekick_model::{
    AssistantMessage, ErrorKind, ModelMessage, ModelProviderError,
    ModelRequest, ModelTool, ToolCallRequest,
};

use crate::conversation::Conversation;
use crate::model_client::{ModelClient, TranscriptFn};
use crate::tool::Registry;
pub use builder::AgentBuilder;

type ToolCallFn = Arc<dyn Fn(&ToolCallRequest) + Send + Sync>;

/// The errors that end a turn early.
///
/// Tool failures never show up here, they are handed back to the model as
/// tool results.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The model provider failed, after retries if the error was transient.
    #[error("model invocation failed: {error}")]
    ModelInvocation {
        /// The error returned by the provider.
        error: Box<dyn ModelProviderError>,
    },
}

impl AgentError {
    /// Returns the kind of the underlying model error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::ModelInvocation { error } => error.kind(),
        }
    }
}

/// The outcome of one user turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    /// The final answer from the model.
    pub text: String,
    /// Tool calls the model made during the turn, in request order.
    pub tool_calls: Vec<ToolCallRequest>,
}

/// An agent instance, which owns a conversation, a model client, and the
/// tools the model may call.
///
/// Each turn runs at most one tool round trip: the model is asked once, the
/// requested tools are run one after another, and the model is asked again
/// for the final answer. Tool calls in that second reply are ignored.
pub struct Agent {
    model_client: ModelClient,
    registry: Registry,
    tool_definitions: Vec<ModelTool>,
    conversation: Conversation,
    initial_len: usize,
    on_transcript: Option<TranscriptFn>,
    on_tool_call: Option<ToolCallFn>,
}

impl Agent {
    fn from_builder(builder: AgentBuilder) -> Self {
        let AgentBuilder {
            model_client,
            system_prompt,
            tools,
            on_transcript,
            on_tool_call,
        } = builder;

        let registry = Registry::with_tools(tools);
        let tool_definitions = registry.definitions();
        let mut conversation = Conversation::default();
        if let Some(prompt) = system_prompt {
            conversation.push(ModelMessage::system(prompt.clone()), prompt);
        }
        let initial_len = conversation.len();

        Self {
            model_client,
            registry,
            tool_definitions,
            conversation,
            initial_len,
            on_transcript,
            on_tool_call,
        }
    }

    /// Runs one turn for `input` and returns the final answer together with
    /// the tool calls made.
    ///
    /// If the model fails, the user message is kept in the conversation and
    /// everything else appended during this turn is dropped.
    pub async fn process_message<S: Into<String>>(
        &mut self,
        input: S,
    ) -> Result<Turn, AgentError> {
        let input = input.into();
        debug!("processing user input: {input:?}");
        self.conversation
            .push(ModelMessage::user(input.clone()), input);
        let checkpoint = self.conversation.len();

        let result = self.run_turn().await;
        if let Err(err) = &result {
            error!("turn failed: {err}");
            self.conversation.truncate(checkpoint);
        }
        result
    }

    /// Drops every message after the system prompt.
    #[inline]
    pub fn reset(&mut self) {
        self.conversation.truncate(self.initial_len);
    }

    /// Returns the conversation so far.
    #[inline]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns the tools advertised to the model, ordered by name.
    #[inline]
    pub fn tool_definitions(&self) -> &[ModelTool] {
        &self.tool_definitions
    }

    async fn run_turn(&mut self) -> Result<Turn, AgentError> {
        let first = self.invoke_model().await?;
        let tool_calls = first.tool_calls.clone();
        let first_text = first.text.clone();
        self.push_assistant(first);

        if tool_calls.is_empty() {
            return Ok(Turn {
                text: first_text,
                tool_calls,
            });
        }

        let mut results = Vec::with_capacity(tool_calls.len());
        for req in &tool_calls {
            if let Some(on_tool_call) = &self.on_tool_call {
                on_tool_call(req);
            }
            results.push(self.registry.dispatch(req).await);
        }
        for result in results {
            let transcript = format!("[{}] {}", result.name, result.content);
            self.conversation
                .push(ModelMessage::Tool(result), transcript);
        }

        let mut second = self.invoke_model().await?;
        if !second.tool_calls.is_empty() {
            warn!(
                "ignoring {} tool call(s) requested after tool results",
                second.tool_calls.len()
            );
            second.tool_calls.clear();
        }
        let text = second.text.clone();
        self.push_assistant(second);

        Ok(Turn { text, tool_calls })
    }

    async fn invoke_model(&self) -> Result<AssistantMessage, AgentError> {
        let req = ModelRequest {
            messages: self.conversation.messages(),
            tools: self.tool_definitions.clone(),
        };
        let resp = self
            .model_client
            .send_request(req, self.on_transcript.clone())
            .await
            .map_err(|error| AgentError::ModelInvocation { error })?;
        trace!("model finished with {:?}", resp.finish_reason);
        Ok(resp.message)
    }

    fn push_assistant(&mut self, msg: AssistantMessage) {
        let mut transcript = msg.text.clone();
        for call in &msg.tool_calls {
            if !transcript.is_empty() {
                transcript.push('\n');
            }
            transcript.push_str(&format!(
                "-> {}({})",
                call.name,
                serde_json::Value::Object(call.arguments.clone())
            ));
        }
        self.conversation
            .push(ModelMessage::Assistant(msg), transcript);
    }
}
