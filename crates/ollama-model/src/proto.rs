use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sidekick_model::{
    ErrorKind, ModelMessage, ModelRequest, ModelTool, ToolCallRequest,
};

use crate::{Error, OllamaConfig};

// ------------------
// Shared message types
// ------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    #[default]
    Assistant,
    Tool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub function: FunctionCall,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

// ------------------------------
// Types received from the server
// ------------------------------

/// One NDJSON record of a streaming `/api/chat` response.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionTool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct Options {
    temperature: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<Options>,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(req: &ModelRequest, config: &OllamaConfig) -> ChatRequest {
    ChatRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        tools: req.tools.iter().map(create_tool).collect(),
        stream: true,
        options: config
            .temperature
            .map(|temperature| Options { temperature }),
    }
}

fn create_message(msg: &ModelMessage) -> Message {
    match msg {
        ModelMessage::System { content } => Message {
            role: Role::System,
            content: content.clone(),
            ..Default::default()
        },
        ModelMessage::User(user) => Message {
            role: Role::User,
            content: user.text.clone(),
            images: user.images.iter().map(|img| img.data.clone()).collect(),
            ..Default::default()
        },
        ModelMessage::Assistant(assistant) => Message {
            role: Role::Assistant,
            content: assistant.text.clone(),
            tool_calls: assistant
                .tool_calls
                .iter()
                .map(|req| ToolCall {
                    id: Some(req.id.clone()),
                    function: FunctionCall {
                        index: None,
                        name: req.name.clone(),
                        arguments: Value::Object(req.arguments.clone()),
                    },
                })
                .collect(),
            ..Default::default()
        },
        ModelMessage::Tool(result) => Message {
            role: Role::Tool,
            content: result.content.clone(),
            tool_name: Some(result.name.clone()),
            ..Default::default()
        },
    }
}

#[inline]
fn create_tool(tool: &ModelTool) -> Tool {
    Tool {
        r#type: "function",
        function: FunctionTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

/// Converts a tool call from the server. `ordinal` is the position of the
/// call within the response and is used to make up an id when the server
/// didn't send one.
pub fn tool_call_request(
    call: ToolCall,
    ordinal: usize,
) -> Result<ToolCallRequest, Error> {
    let ToolCall { id, function } = call;
    if function.name.is_empty() {
        return Err(Error::new(
            "tool call without a name",
            ErrorKind::MalformedResponse,
        ));
    }
    let arguments = match function.arguments {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        // Some models encode the arguments as a JSON string.
        Value::String(encoded) => serde_json::from_str::<Map<String, Value>>(
            &encoded,
        )
        .map_err(|err| {
            Error::new(
                format!("invalid arguments for `{}`: {err}", function.name),
                ErrorKind::MalformedResponse,
            )
        })?,
        other => {
            return Err(Error::new(
                format!(
                    "arguments for `{}` must be an object, got {other}",
                    function.name
                ),
                ErrorKind::MalformedResponse,
            ));
        }
    };
    Ok(ToolCallRequest {
        id: id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("call_{ordinal}")),
        name: function.name,
        arguments,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sidekick_model::{
        AssistantMessage, ImageAttachment, ToolCallResult, UserMessage,
    };

    use super::*;
    use crate::OllamaConfigBuilder;

    #[test]
    fn test_create_request() {
        let mut arguments = Map::new();
        arguments.insert("expression".to_owned(), json!("2 + 2 * 5"));
        let request = ModelRequest {
            messages: vec![
                ModelMessage::system("You are a helpful assistant."),
                ModelMessage::User(UserMessage {
                    text: "What is 2 + 2 * 5".to_owned(),
                    images: vec![ImageAttachment {
                        media_type: "image/jpeg".to_owned(),
                        data: "aGVsbG8=".to_owned(),
                    }],
                }),
                ModelMessage::Assistant(AssistantMessage {
                    text: String::new(),
                    tool_calls: vec![ToolCallRequest {
                        id: "call_0".to_owned(),
                        name: "calculator".to_owned(),
                        arguments,
                    }],
                }),
                ModelMessage::Tool(ToolCallResult {
                    id: "call_0".to_owned(),
                    name: "calculator".to_owned(),
                    content: "12".to_owned(),
                }),
            ],
            tools: vec![ModelTool {
                name: "calculator".to_owned(),
                description: "Evaluates a mathematical expression.".to_owned(),
                parameters: json!({ "type": "object" }),
            }],
        };
        let config = OllamaConfigBuilder::with_model("mistral")
            .with_temperature(0.0)
            .build();

        let value = serde_json::to_value(create_request(&request, &config))
            .unwrap();
        assert_eq!(
            value,
            json!({
                "model": "mistral",
                "messages": [
                    { "role": "system", "content": "You are a helpful assistant." },
                    {
                        "role": "user",
                        "content": "What is 2 + 2 * 5",
                        "images": ["aGVsbG8="]
                    },
                    {
                        "role": "assistant",
                        "content": "",
                        "tool_calls": [{
                            "id": "call_0",
                            "function": {
                                "name": "calculator",
                                "arguments": { "expression": "2 + 2 * 5" }
                            }
                        }]
                    },
                    { "role": "tool", "content": "12", "tool_name": "calculator" }
                ],
                "tools": [{
                    "type": "function",
                    "function": {
                        "name": "calculator",
                        "description": "Evaluates a mathematical expression.",
                        "parameters": { "type": "object" }
                    }
                }],
                "stream": true,
                "options": { "temperature": 0.0 }
            })
        );
    }

    #[test]
    fn test_tool_call_arguments() {
        let call: ToolCall = serde_json::from_value(json!({
            "function": { "name": "speak", "arguments": { "text": "hello" } }
        }))
        .unwrap();
        let req = tool_call_request(call, 3).unwrap();
        assert_eq!(req.id, "call_3");
        assert_eq!(req.arguments["text"], "hello");

        let call: ToolCall = serde_json::from_value(json!({
            "id": "abc",
            "function": { "name": "speak", "arguments": "{\"text\":\"hi\"}" }
        }))
        .unwrap();
        let req = tool_call_request(call, 0).unwrap();
        assert_eq!(req.id, "abc");
        assert_eq!(req.arguments["text"], "hi");

        let call: ToolCall = serde_json::from_value(json!({
            "function": { "name": "speak", "arguments": [1, 2] }
        }))
        .unwrap();
        let err = tool_call_request(call, 0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedResponse);
    }
}
