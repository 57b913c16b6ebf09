use sidekick_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

use crate::speech::Speaker;

#[derive(Deserialize, JsonSchema)]
pub struct SpeakParameters {
    #[schemars(description = "The text to say out loud.")]
    text: String,
}

/// A tool for speaking text through the local speech engine.
pub struct SpeakTool {
    speaker: Speaker,
    parameter_schema: Value,
}

impl SpeakTool {
    /// Creates a new speak tool.
    #[inline]
    pub fn new(speaker: Speaker) -> Self {
        SpeakTool {
            speaker,
            parameter_schema: schema_for!(SpeakParameters).to_value(),
        }
    }
}

impl Tool for SpeakTool {
    type Input = SpeakParameters;

    fn name(&self) -> &str {
        "speak"
    }

    fn description(&self) -> &str {
        r#"
Speaks the given text out loud on this computer and waits until it is finished.
Use it when the user asks you to say, read aloud, or pronounce something."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: SpeakParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let speaker = self.speaker.clone();
        async move {
            speaker.speak(&input.text).await.map_err(|err| {
                ToolError::synthesis_error().with_reason(format!("{err}"))
            })
        }
    }
}
