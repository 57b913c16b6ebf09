use sidekick_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use tokio::task::spawn_blocking;

use crate::sandbox::{Sandbox, SandboxError};

#[derive(Deserialize, JsonSchema)]
pub struct ReadFileParameters {
    #[schemars(description = "Path of the file, relative to the project root.")]
    file_path: String,
}

/// A tool for reading a UTF-8 text file inside the sandbox.
pub struct ReadFileTool {
    sandbox: Sandbox,
    parameter_schema: Value,
}

impl ReadFileTool {
    /// Creates a new read file tool confined to `sandbox`.
    #[inline]
    pub fn new(sandbox: Sandbox) -> Self {
        ReadFileTool {
            sandbox,
            parameter_schema: schema_for!(ReadFileParameters).to_value(),
        }
    }
}

impl Tool for ReadFileTool {
    type Input = ReadFileParameters;

    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        r#"
Reads the content of a file from the project directory.
Useful for getting information from local files like documentation, code, or data.
Input must be a valid file path relative to the project root."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: ReadFileParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let sandbox = self.sandbox.clone();
        async move {
            let path = input.file_path;
            let result = spawn_blocking({
                let path = path.clone();
                move || sandbox.read_to_string(&path)
            })
            .await
            .map_err(|_| {
                ToolError::execution_error().with_reason("Failed to read file")
            })?;
            result.map_err(|err| sandbox_error(&path, err))
        }
    }
}

/// Describes a sandbox failure for `path` the way the model expects.
pub(crate) fn sandbox_error(path: &str, err: SandboxError) -> ToolError {
    match err {
        SandboxError::AccessDenied(_) => ToolError::access_denied()
            .with_reason(format!(
                "Access denied. Cannot read file outside project directory: {path}"
            )),
        SandboxError::NotFound(_) => ToolError::not_found()
            .with_reason(format!("File not found at {path}")),
        SandboxError::Decode { source, .. } => ToolError::decode_error()
            .with_reason(format!("Error reading file {path}: {source}")),
        SandboxError::Io { source, .. } => ToolError::execution_error()
            .with_reason(format!("Error reading file {path}: {source}")),
    }
}
