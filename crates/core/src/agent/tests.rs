use std::future::ready;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use sidekick_model::{ErrorKind, ModelMessage};
use sidekick_test_model::{PresetEvent, PresetResponse, TestModelProvider};

use crate::tool::{Error, ToolResult};
use crate::{AgentBuilder, Tool};

static SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "type": "object",
        "properties": { "text": { "type": "string" } },
        "required": ["text"]
    })
});

#[derive(Deserialize)]
struct TextInput {
    text: String,
}

/// Records every input it receives and returns it uppercased.
#[derive(Clone, Default)]
struct ShoutTool {
    calls: Arc<Mutex<Vec<String>>>,
}

impl Tool for ShoutTool {
    type Input = TextInput;

    fn name(&self) -> &str {
        "shout"
    }

    fn description(&self) -> &str {
        "Uppercases the text"
    }

    fn parameter_schema(&self) -> &Value {
        &SCHEMA
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        self.calls.lock().unwrap().push(input.text.clone());
        ready(Ok(input.text.to_uppercase()))
    }
}

struct FailingTool;

impl Tool for FailingTool {
    type Input = TextInput;

    fn name(&self) -> &str {
        "fail"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameter_schema(&self) -> &Value {
        &SCHEMA
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        ready(Err(Error::not_found()
            .with_reason(format!("File not found at {}", input.text))))
    }
}

fn tool_results(messages: &[ModelMessage]) -> Vec<(String, String)> {
    messages
        .iter()
        .filter_map(|msg| match msg {
            ModelMessage::Tool(result) => {
                Some((result.id.clone(), result.content.clone()))
            }
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_simple_message() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::with_events([
        PresetEvent::MessageDelta("Hi, ".to_owned()),
        PresetEvent::MessageDelta("what can I do for you?".to_owned()),
    ]));

    let transcript = Arc::new(Mutex::new(String::new()));
    let mut agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_system_prompt("You are helpful.")
        .on_transcript({
            let transcript = Arc::clone(&transcript);
            move |delta| transcript.lock().unwrap().push_str(delta)
        })
        .build();

    let turn = agent.process_message("Hello").await.unwrap();
    assert_eq!(turn.text, "Hi, what can I do for you?");
    assert!(turn.tool_calls.is_empty());
    assert_eq!(model_provider.request_count(), 1);
    assert_eq!(*transcript.lock().unwrap(), "Hi, what can I do for you?");

    // System, User, Assistant.
    let items = agent.conversation().items();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].message(), &ModelMessage::system("You are helpful."));
    assert_eq!(items[1].transcript(), "Hello");
}

#[tokio::test]
async fn test_tool_round_trip() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::with_events([
        PresetEvent::tool_call("call_a", "shout", json!({ "text": "one" })),
        PresetEvent::tool_call("call_b", "shout", json!({ "text": "two" })),
    ]));
    model_provider.add_response(PresetResponse::text("Done."));

    let shout = ShoutTool::default();
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));
    let mut agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_tool(shout.clone())
        .on_tool_call({
            let seen = Arc::clone(&seen);
            move |req| seen.lock().unwrap().push(req.id.clone())
        })
        .build();

    let turn = agent.process_message("Shout twice").await.unwrap();
    assert_eq!(turn.text, "Done.");
    assert_eq!(turn.tool_calls.len(), 2);
    assert_eq!(*shout.calls.lock().unwrap(), ["one", "two"]);
    assert_eq!(*seen.lock().unwrap(), ["call_a", "call_b"]);
    assert_eq!(model_provider.request_count(), 2);

    // The second request carries both results, in request order.
    let requests = model_provider.requests();
    assert_eq!(
        tool_results(&requests[1].messages),
        [
            ("call_a".to_owned(), "ONE".to_owned()),
            ("call_b".to_owned(), "TWO".to_owned()),
        ]
    );
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(requests[0].tools[0].name, "shout");

    // User, Assistant, Tool, Tool, Assistant.
    assert_eq!(agent.conversation().len(), 5);
}

#[tokio::test]
async fn test_unknown_tool() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::with_events([
        PresetEvent::tool_call("call_0", "teleport", json!({})),
    ]));
    model_provider.add_response(PresetResponse::text("I can't do that."));

    let mut agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_tool(ShoutTool::default())
        .build();

    let turn = agent.process_message("Beam me up").await.unwrap();
    assert_eq!(turn.text, "I can't do that.");

    let requests = model_provider.requests();
    let results = tool_results(&requests[1].messages);
    assert_eq!(results[0].1, "Error: unknown tool: teleport");
}

#[tokio::test]
async fn test_tool_errors_become_results() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::with_events([
        PresetEvent::tool_call("call_0", "fail", json!({ "text": "a.txt" })),
        PresetEvent::tool_call("call_1", "shout", json!({ "txt": "typo" })),
    ]));
    model_provider.add_response(PresetResponse::text("Sorry."));

    let shout = ShoutTool::default();
    let mut agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_tool(FailingTool)
        .with_tool(shout.clone())
        .build();

    agent.process_message("Try it").await.unwrap();

    let requests = model_provider.requests();
    let results = tool_results(&requests[1].messages);
    assert_eq!(results[0].1, "Error: not found: File not found at a.txt");
    assert!(results[1].1.starts_with("Error: invalid input: "));
    assert!(shout.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_second_round_tool_calls_ignored() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::with_events([
        PresetEvent::tool_call("call_0", "shout", json!({ "text": "a" })),
    ]));
    model_provider.add_response(PresetResponse::with_events([
        PresetEvent::MessageDelta("A".to_owned()),
        PresetEvent::tool_call("call_1", "shout", json!({ "text": "b" })),
    ]));

    let shout = ShoutTool::default();
    let mut agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_tool(shout.clone())
        .build();

    let turn = agent.process_message("Go").await.unwrap();
    assert_eq!(turn.text, "A");
    assert_eq!(turn.tool_calls.len(), 1);
    assert_eq!(*shout.calls.lock().unwrap(), ["a"]);
    assert_eq!(model_provider.request_count(), 2);

    let last = agent.conversation().items().last().unwrap();
    assert!(last.message().tool_calls().is_empty());
}

#[tokio::test]
async fn test_model_error() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::with_events([
        PresetEvent::tool_call("call_0", "shout", json!({ "text": "a" })),
    ]));
    model_provider.add_response(PresetResponse::text("never").with_failures(0));

    let mut agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_system_prompt("sys")
        .with_tool(ShoutTool::default())
        .build();

    let err = agent.process_message("Go").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Other);
    assert!(err.to_string().starts_with("model invocation failed: "));

    // Only the user message is kept from the failed turn.
    let items = agent.conversation().items();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].message(), &ModelMessage::user("Go"));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_retry() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::text("Finally.").with_failures(2));

    let mut agent =
        AgentBuilder::with_model_provider(model_provider.clone()).build();

    let turn = agent.process_message("Hello").await.unwrap();
    assert_eq!(turn.text, "Finally.");
    assert_eq!(model_provider.request_count(), 3);
}

#[tokio::test]
async fn test_rate_limit_without_retry() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::text("Finally.").with_failures(2));

    let mut agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_retry_budget(Duration::ZERO)
        .build();

    let err = agent.process_message("Hello").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
    assert_eq!(model_provider.request_count(), 1);
}

#[tokio::test]
async fn test_reset() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::text("One."));
    model_provider.add_response(PresetResponse::text("Two."));

    let mut agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_system_prompt("sys")
        .build();

    agent.process_message("first").await.unwrap();
    assert_eq!(agent.conversation().len(), 3);

    agent.reset();
    assert_eq!(agent.conversation().len(), 1);

    agent.process_message("second").await.unwrap();
    let requests = model_provider.requests();
    assert_eq!(
        requests[1].messages,
        [ModelMessage::system("sys"), ModelMessage::user("second")]
    );
}

#[tokio::test]
async fn test_history_persists_across_turns() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::text("One."));
    model_provider.add_response(PresetResponse::text("Two."));

    let mut agent =
        AgentBuilder::with_model_provider(model_provider.clone()).build();

    agent.process_message("first").await.unwrap();
    agent.process_message("second").await.unwrap();

    let requests = model_provider.requests();
    assert_eq!(requests[1].messages.len(), 3);
    assert_eq!(agent.tool_definitions().len(), 0);
}
