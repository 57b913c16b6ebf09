//! Runs scenarios against a session.

use owo_colors::OwoColorize;
use sidekick::Session;

use crate::compare::tool_calls_match;
use crate::judge::Judge;
use crate::report::{CaseResult, Outcome, Report, Status};
use crate::scenario::{GroundTruth, ScenarioFile, TestCase, ToolCallRecord};

/// Runs every case of every file on `session`, resetting the conversation
/// before each case.
pub async fn run_scenarios(
    session: &mut Session,
    judge: &Judge,
    ground_truth: &GroundTruth,
    files: &[ScenarioFile],
) -> Report {
    let mut report = Report::default();
    for file in files {
        println!("\n{}", format!("Loading scenario: {}", file.file_name).yellow());
        let mut results = Vec::with_capacity(file.cases.len());
        for (index, case) in file.cases.iter().enumerate() {
            let name = case
                .name
                .clone()
                .unwrap_or_else(|| format!("Unnamed Test Case {}", index + 1));
            println!("  {}", format!("Running test: {name}").blue());
            println!("    User Input: {}", case.user_input);

            let result = run_case(session, judge, ground_truth, name, case).await;
            print_result(&result);
            results.push(result);
        }
        report.scenarios.insert(file.file_name.clone(), results);
    }
    report
}

async fn run_case(
    session: &mut Session,
    judge: &Judge,
    ground_truth: &GroundTruth,
    name: String,
    case: &TestCase,
) -> CaseResult {
    session.reset();
    let turn = match session.send_message(&case.user_input).await {
        Ok(turn) => turn,
        Err(err) => {
            return CaseResult {
                name,
                user_input: case.user_input.clone(),
                outcome: Outcome::Errored {
                    error: err.to_string(),
                },
                status: Status::Error,
            };
        }
    };

    let expected = ground_truth.resolve(&case.expected_response_contains);
    let verdict = judge.evaluate(&turn.text, expected).await;
    let actual_tool_calls: Vec<ToolCallRecord> =
        turn.tool_calls.iter().map(ToolCallRecord::from).collect();
    let tool_calls_match =
        tool_calls_match(&case.expected_tool_calls, &actual_tool_calls);

    let status = if verdict.passed && tool_calls_match {
        Status::Passed
    } else {
        Status::Failed
    };
    CaseResult {
        name,
        user_input: case.user_input.clone(),
        outcome: Outcome::Completed {
            final_response: turn.text,
            actual_tool_calls,
            expected_tool_calls: case.expected_tool_calls.clone(),
            expected_response_evaluated_against: expected.to_owned(),
            response_is_correct_llm: verdict.passed,
            llm_reasoning: verdict.reasoning,
            tool_calls_match,
        },
        status,
    }
}

fn print_result(result: &CaseResult) {
    match &result.outcome {
        Outcome::Completed {
            final_response,
            actual_tool_calls,
            expected_tool_calls,
            response_is_correct_llm,
            llm_reasoning,
            tool_calls_match,
            ..
        } => {
            println!("    Agent Response: {final_response}");
            println!("    Actual Tool Calls: {}", render(actual_tool_calls));
            println!("    Expected Tool Calls: {}", render(expected_tool_calls));
            println!(
                "    Response Correct (LLM): {response_is_correct_llm} - Reason: {llm_reasoning}"
            );
            println!("    Tool Calls Match: {tool_calls_match}");
        }
        Outcome::Errored { error } => {
            println!("    Error during test execution: {error}");
        }
    }
    let status = match result.status {
        Status::Passed => result.status.green().to_string(),
        Status::Failed | Status::Error => result.status.red().to_string(),
    };
    println!("    Status: {status}\n");
}

fn render(calls: &[ToolCallRecord]) -> String {
    serde_json::to_string(calls).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use sidekick::SessionBuilder;
    use sidekick::sandbox::Sandbox;
    use sidekick_core::ModelClient;
    use sidekick_test_model::{PresetEvent, PresetResponse, TestModelProvider};

    use super::*;

    fn files() -> Vec<ScenarioFile> {
        let cases: Vec<TestCase> = serde_json::from_value(json!([
            {
                "name": "Basic arithmetic",
                "user_input": "What is 2 + 2 * 5?",
                "expected_tool_calls": [
                    { "name": "calculator", "args": { "expression": "2 + 2 * 5" } }
                ],
                "expected_response_contains": "12"
            },
            {
                "user_input": "Hello",
                "expected_response_contains": "a greeting"
            },
            {
                "name": "Broken model",
                "user_input": "Anyone there?"
            }
        ]))
        .unwrap();
        vec![ScenarioFile {
            file_name: "basic.json".to_owned(),
            cases,
        }]
    }

    #[tokio::test]
    async fn test_run_scenarios() {
        let dir = tempfile::tempdir().unwrap();
        let agent_model = TestModelProvider::default();
        agent_model.add_response(PresetResponse::with_events([
            PresetEvent::tool_call(
                "call_0",
                "calculator",
                json!({ "expression": "2 + 2 * 5" }),
            ),
        ]));
        agent_model.add_response(PresetResponse::text("It is 12."));
        agent_model.add_response(PresetResponse::text("Hi there!"));
        agent_model.add_response(PresetResponse::text("x").with_failures(0));

        let judge_model = TestModelProvider::default();
        judge_model.add_response(PresetResponse::text("[[YES]] Correct."));
        judge_model.add_response(PresetResponse::text("[[NO]] Not a greeting."));

        let mut session = SessionBuilder::with_model_provider(agent_model.clone())
            .with_system_prompt("sys")
            .with_sandbox(Sandbox::new(dir.path()).unwrap())
            .with_retry_budget(Duration::ZERO)
            .build()
            .unwrap();
        let judge = Judge::new(ModelClient::new(judge_model.clone()));

        let report = run_scenarios(
            &mut session,
            &judge,
            &GroundTruth::default(),
            &files(),
        )
        .await;

        let results = &report.scenarios["basic.json"];
        let statuses: Vec<_> = results.iter().map(|r| r.status).collect();
        assert_eq!(statuses, [Status::Passed, Status::Failed, Status::Error]);
        assert_eq!(results[1].name, "Unnamed Test Case 2");

        // Each case starts from the system prompt alone.
        let requests = agent_model.requests();
        assert_eq!(requests[2].messages.len(), 2);
        assert_eq!(requests[3].messages.len(), 2);

        let summary = report.summary(Duration::ZERO);
        assert_eq!((summary.cases, summary.passed), (3, 1));
    }
}
