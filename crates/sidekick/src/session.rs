use std::io;
use std::time::Duration;

use sidekick_core::{Agent, AgentBuilder, AgentError, ModelClient, Turn};
use sidekick_model::{ModelProvider, ToolCallRequest};
use sidekick_ollama_model::{OllamaConfigBuilder, OllamaProvider};

use crate::config::{Config, DEFAULT_SEARCH_URL, DEFAULT_VISION_MODEL};
use crate::sandbox::Sandbox;
use crate::search::SearchClient;
use crate::speech::Speaker;
use crate::tools::*;

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("./system_prompt.md");

/// Returns the built-in system prompt for the current platform.
pub fn default_system_prompt() -> String {
    SYSTEM_PROMPT_TEMPLATE.replace("{{HOST_OS}}", host_os())
}

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
    sandbox: Option<Sandbox>,
    vision: Option<ModelClient>,
    speaker: Speaker,
    search: SearchClient,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    ///
    /// The other collaborators start from their defaults: the current
    /// directory as sandbox, the default vision model on a local Ollama
    /// server, the platform speech engine and the public search endpoint.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let agent_builder = AgentBuilder::with_model_provider(provider);
        Self {
            agent_builder,
            sandbox: None,
            vision: None,
            speaker: Speaker::new(crate::config::default_speech_command()),
            search: SearchClient::new(DEFAULT_SEARCH_URL),
        }
    }

    /// Creates a session builder wired to Ollama as described by `config`,
    /// with the built-in system prompt.
    pub fn from_config(config: &Config) -> io::Result<Self> {
        let text_model = OllamaProvider::new(
            OllamaConfigBuilder::with_model(&config.model)
                .with_base_url(&config.ollama_url)
                .build(),
        );
        let vision_model = OllamaProvider::new(
            OllamaConfigBuilder::with_model(&config.vision_model)
                .with_base_url(&config.ollama_url)
                .build(),
        );
        Ok(Self::with_model_provider(text_model)
            .with_system_prompt(default_system_prompt())
            .with_sandbox(Sandbox::new(&config.root)?)
            .with_vision_provider(vision_model)
            .with_speaker(Speaker::new(&config.speech_command))
            .with_search_client(SearchClient::new(&config.search_url)))
    }

    /// Sets the system prompt for the agent.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.agent_builder = self.agent_builder.with_system_prompt(prompt);
        self
    }

    /// Sets the directory the file and image tools are confined to.
    #[inline]
    pub fn with_sandbox(mut self, sandbox: Sandbox) -> Self {
        self.sandbox = Some(sandbox);
        self
    }

    /// Sets the model used to describe images.
    #[inline]
    pub fn with_vision_provider<V: ModelProvider + 'static>(
        mut self,
        provider: V,
    ) -> Self {
        self.vision = Some(ModelClient::new(provider));
        self
    }

    /// Sets the speech engine.
    #[inline]
    pub fn with_speaker(mut self, speaker: Speaker) -> Self {
        self.speaker = speaker;
        self
    }

    /// Sets the search client.
    #[inline]
    pub fn with_search_client(mut self, search: SearchClient) -> Self {
        self.search = search;
        self
    }

    /// Sets how long rate-limited model requests are retried.
    #[inline]
    pub fn with_retry_budget(mut self, budget: Duration) -> Self {
        self.agent_builder = self.agent_builder.with_retry_budget(budget);
        self
    }

    /// Attaches a callback receiving the assistant text as it streams.
    #[inline]
    pub fn on_transcript(
        mut self,
        on_transcript: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_transcript(on_transcript);
        self
    }

    /// Attaches a callback to be invoked right before a tool runs.
    #[inline]
    pub fn on_tool_call(
        mut self,
        on_tool_call: impl Fn(&ToolCallRequest) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_tool_call(on_tool_call);
        self
    }

    /// Builds a new session with all built-in tools registered.
    ///
    /// Fails if no sandbox was set and the current directory can't be
    /// resolved.
    pub fn build(self) -> io::Result<Session> {
        let sandbox = match self.sandbox {
            Some(sandbox) => sandbox,
            None => Sandbox::new(".")?,
        };
        let vision = self.vision.unwrap_or_else(|| {
            ModelClient::new(OllamaProvider::new(
                OllamaConfigBuilder::with_model(DEFAULT_VISION_MODEL).build(),
            ))
        });
        debug!("sandbox root: {}", sandbox.root().display());

        let agent = self
            .agent_builder
            .with_tool(DuckDuckGoSearchTool::new(self.search))
            .with_tool(ReadFileTool::new(sandbox.clone()))
            .with_tool(CalculatorTool::new())
            .with_tool(DescribeImageTool::new(sandbox, vision))
            .with_tool(SpeakTool::new(self.speaker))
            .build();

        Ok(Session { agent })
    }
}

/// A chat session, like a window that displays messages and has a input box.
///
/// The session holds a fully configured agent that you can use directly, and it
/// is basically a wrapper around [`Agent`].
pub struct Session {
    agent: Agent,
}

impl Session {
    /// Sends a message to the session and waits for the answer.
    #[inline]
    pub async fn send_message(
        &mut self,
        message: &str,
    ) -> Result<Turn, AgentError> {
        self.agent.process_message(message).await
    }

    /// Forgets the conversation, keeping the system prompt.
    #[inline]
    pub fn reset(&mut self) {
        self.agent.reset();
    }

    /// Returns the underlying agent.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}

#[inline]
fn host_os() -> &'static str {
    let os = std::env::consts::OS;
    match os {
        "linux" => "Linux",
        "macos" => "macOS",
        "windows" => "Windows",
        _ => "some other OS",
    }
}
