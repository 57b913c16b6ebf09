//! Environment-driven configuration.

use std::env;
use std::io;
use std::path::PathBuf;

/// Where the Ollama server listens by default.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
/// The text model used for conversation.
pub const DEFAULT_MODEL: &str = "mistral";
/// The model used by the `describe_image` tool.
pub const DEFAULT_VISION_MODEL: &str = "llava";
/// The DuckDuckGo Instant Answer endpoint.
pub const DEFAULT_SEARCH_URL: &str = "https://api.duckduckgo.com/";

/// Runtime settings for a session.
///
/// | Variable | Default |
/// |---|---|
/// | `SIDEKICK_OLLAMA_URL` | `http://localhost:11434` |
/// | `SIDEKICK_MODEL` | `mistral` |
/// | `SIDEKICK_VISION_MODEL` | `llava` |
/// | `SIDEKICK_ROOT` | the current directory |
/// | `SIDEKICK_SPEECH_COMMAND` | `say` on macOS, `espeak` elsewhere |
/// | `SIDEKICK_SEARCH_URL` | `https://api.duckduckgo.com/` |
///
/// Empty values are treated as unset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the Ollama server.
    pub ollama_url: String,
    /// Text model name.
    pub model: String,
    /// Vision model name.
    pub vision_model: String,
    /// Root directory the file and image tools are confined to.
    pub root: PathBuf,
    /// Speech engine command line, the text is appended as the last
    /// argument.
    pub speech_command: String,
    /// Search endpoint.
    pub search_url: String,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> io::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> io::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let root = match var("SIDEKICK_ROOT") {
            Some(root) => PathBuf::from(root),
            None => env::current_dir()?,
        };

        Ok(Self {
            ollama_url: var("SIDEKICK_OLLAMA_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_owned()),
            model: var("SIDEKICK_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            vision_model: var("SIDEKICK_VISION_MODEL")
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_owned()),
            root,
            speech_command: var("SIDEKICK_SPEECH_COMMAND")
                .unwrap_or_else(|| default_speech_command().to_owned()),
            search_url: var("SIDEKICK_SEARCH_URL")
                .unwrap_or_else(|| DEFAULT_SEARCH_URL.to_owned()),
        })
    }
}

/// Returns the speech engine available out of the box on this platform.
#[inline]
pub fn default_speech_command() -> &'static str {
    if cfg!(target_os = "macos") {
        "say"
    } else {
        "espeak"
    }
}
