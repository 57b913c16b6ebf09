use std::collections::BTreeMap;

use sidekick_model::{ModelTool, ToolCallRequest, ToolCallResult};
use tracing::Instrument;

use crate::tool::{Error, ToolObject, ToolResult};

/// The set of tools advertised to the model, keyed by name.
///
/// Dispatching never fails: every request produces a result whose content
/// is either the tool output or a rendered [`Error`].
#[derive(Default)]
pub struct Registry {
    tools: BTreeMap<String, Box<dyn ToolObject>>,
}

impl Registry {
    pub(crate) fn with_tools(tools: Vec<Box<dyn ToolObject>>) -> Self {
        let mut tool_map = BTreeMap::new();
        for tool in tools {
            let name = tool.name().to_owned();
            if tool_map.insert(name.clone(), tool).is_some() {
                warn!("tool `{name}` registered twice, keeping the last one");
            }
        }
        Self { tools: tool_map }
    }

    /// Returns the definitions of all tools, ordered by name.
    #[inline]
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools
            .values()
            .map(|tool| ModelTool {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.parameter_schema().clone(),
            })
            .collect()
    }

    /// Runs the tool requested by `req` and waits for its result.
    pub async fn dispatch(&self, req: &ToolCallRequest) -> ToolCallResult {
        let span = debug_span!("tool dispatch", id = %req.id, name = %req.name);
        let result = self.run(req).instrument(span).await;
        let content = match result {
            Ok(output) => output,
            Err(err) => {
                debug!("tool `{}` failed: {err}", req.name);
                format!("Error: {err}")
            }
        };
        ToolCallResult {
            id: req.id.clone(),
            name: req.name.clone(),
            content,
        }
    }

    async fn run(&self, req: &ToolCallRequest) -> ToolResult {
        let Some(tool) = self.tools.get(&req.name) else {
            warn!("tool not found: {}", req.name);
            return Err(Error::unknown_tool().with_reason(req.name.clone()));
        };

        trace!("running a tool with args: {:?}", req.arguments);
        // Spawned so that a panicking tool is reported to the model
        // instead of tearing down the turn.
        let handle = tokio::spawn(tool.execute(req.arguments.clone()));
        match handle.await {
            Ok(result) => result,
            Err(err) => {
                error!("tool `{}` aborted: {err}", req.name);
                Err(Error::execution_error().with_reason("tool panicked"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::ready;
    use std::sync::LazyLock;

    use serde::Deserialize;
    use serde_json::{Map, Value, json};

    use super::*;
    use crate::tool::{AnyTool, Tool};

    static EMPTY_SCHEMA: LazyLock<Value> =
        LazyLock::new(|| json!({ "type": "object" }));

    #[derive(Deserialize)]
    struct EchoInput {
        text: String,
    }

    struct EchoTool(&'static str);

    impl Tool for EchoTool {
        type Input = EchoInput;

        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "Echoes the text"
        }

        fn parameter_schema(&self) -> &Value {
            &EMPTY_SCHEMA
        }

        fn execute(
            &self,
            input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            ready(Ok(input.text))
        }
    }

    struct PanicTool;

    impl Tool for PanicTool {
        type Input = Value;

        fn name(&self) -> &str {
            "panic"
        }

        fn description(&self) -> &str {
            "Always panics"
        }

        fn parameter_schema(&self) -> &Value {
            &EMPTY_SCHEMA
        }

        fn execute(
            &self,
            _input: Self::Input,
        ) -> impl Future<Output = ToolResult> + Send + 'static {
            async { panic!("boom") }
        }
    }

    fn registry() -> Registry {
        Registry::with_tools(vec![
            Box::new(AnyTool(EchoTool("echo"))),
            Box::new(AnyTool(EchoTool("alpha"))),
            Box::new(AnyTool(PanicTool)),
        ])
    }

    fn request(name: &str, arguments: Value) -> ToolCallRequest {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        ToolCallRequest {
            id: "call_0".to_owned(),
            name: name.to_owned(),
            arguments,
        }
    }

    #[test]
    fn test_definitions_sorted() {
        let names: Vec<_> = registry()
            .definitions()
            .into_iter()
            .map(|tool| tool.name)
            .collect();
        assert_eq!(names, ["alpha", "echo", "panic"]);
    }

    #[tokio::test]
    async fn test_dispatch() {
        let registry = registry();
        let result =
            registry.dispatch(&request("echo", json!({ "text": "hi" }))).await;
        assert_eq!(result.id, "call_0");
        assert_eq!(result.name, "echo");
        assert_eq!(result.content, "hi");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let result = registry().dispatch(&request("nope", json!({}))).await;
        assert_eq!(result.content, "Error: unknown tool: nope");
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let result = registry()
            .dispatch(&request("echo", json!({ "txt": "hi" })))
            .await;
        assert!(result.content.starts_with("Error: invalid input: "));
    }

    #[tokio::test]
    async fn test_panicking_tool() {
        let result = registry().dispatch(&request("panic", json!({}))).await;
        assert_eq!(result.content, "Error: execution error: tool panicked");
    }
}
