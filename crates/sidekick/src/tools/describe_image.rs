use sidekick_core::ModelClient;
use sidekick_core::tool::{Error as ToolError, Tool, ToolResult};
use sidekick_model::{ImageAttachment, ModelMessage, ModelRequest, UserMessage};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use tokio::task::spawn_blocking;

use crate::image::{self, ImageError, MEDIA_TYPE};
use crate::sandbox::Sandbox;
use crate::tools::read_file::sandbox_error;

/// The instruction sent to the vision model along with the image.
pub const DESCRIBE_PROMPT: &str =
    "Describe this image in detail. Mention the main subjects, any visible \
     text, and the overall setting.";

#[derive(Deserialize, JsonSchema)]
pub struct DescribeImageParameters {
    #[schemars(
        description = "Path of the image file, relative to the project root."
    )]
    image_path: String,
}

/// A tool that asks a vision model to describe an image in the sandbox.
pub struct DescribeImageTool {
    sandbox: Sandbox,
    vision: ModelClient,
    parameter_schema: Value,
}

impl DescribeImageTool {
    /// Creates a new describe image tool that sends images to `vision`.
    #[inline]
    pub fn new(sandbox: Sandbox, vision: ModelClient) -> Self {
        DescribeImageTool {
            sandbox,
            vision,
            parameter_schema: schema_for!(DescribeImageParameters).to_value(),
        }
    }
}

impl Tool for DescribeImageTool {
    type Input = DescribeImageParameters;

    fn name(&self) -> &str {
        "describe_image"
    }

    fn description(&self) -> &str {
        r#"
Describes the content of an image file in the project directory using a vision model.
Input must be a valid image path relative to the project root (PNG, JPEG, GIF, BMP or WebP)."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: DescribeImageParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let sandbox = self.sandbox.clone();
        let vision = self.vision.clone();
        async move {
            let path = input.image_path;
            let data = spawn_blocking({
                let path = path.clone();
                move || image::prepare(&sandbox, &path)
            })
            .await
            .map_err(|_| {
                ToolError::execution_error()
                    .with_reason("Failed to prepare image")
            })?
            .map_err(|err| image_error(&path, err))?;

            let req = ModelRequest {
                messages: vec![ModelMessage::User(UserMessage {
                    text: DESCRIBE_PROMPT.to_owned(),
                    images: vec![ImageAttachment {
                        media_type: MEDIA_TYPE.to_owned(),
                        data,
                    }],
                })],
                tools: vec![],
            };
            let resp = vision.send_request(req, None).await.map_err(|err| {
                ToolError::execution_error()
                    .with_reason(format!("Vision model failed: {err}"))
            })?;
            Ok(resp.message.text)
        }
    }
}

fn image_error(path: &str, err: ImageError) -> ToolError {
    match err {
        ImageError::Sandbox(err) => sandbox_error(path, err),
        ImageError::Decode(err) => ToolError::decode_error()
            .with_reason(format!("Error reading image {path}: {err}")),
        ImageError::Encode(err) => ToolError::execution_error()
            .with_reason(format!("Error encoding image {path}: {err}")),
    }
}
