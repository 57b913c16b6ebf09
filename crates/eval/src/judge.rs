//! Model-graded answers.

use sidekick_core::ModelClient;
use sidekick_model::{ModelMessage, ModelRequest};

const YES: &str = "[[YES]]";

/// The outcome of grading one answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    pub reasoning: String,
}

/// Asks a model whether an answer matches the expected content.
pub struct Judge {
    client: ModelClient,
}

impl Judge {
    /// Creates a judge backed by `client`, which should sample at
    /// temperature 0.
    pub fn new(client: ModelClient) -> Self {
        Self { client }
    }

    /// Grades `response` against `expected`. Failing to reach the model
    /// counts as a failed verdict.
    pub async fn evaluate(&self, response: &str, expected: &str) -> Verdict {
        let req = ModelRequest {
            messages: vec![ModelMessage::user(judge_prompt(response, expected))],
            tools: vec![],
        };
        match self.client.send_request(req, None).await {
            Ok(resp) => {
                let reasoning = resp.message.text.trim().to_owned();
                Verdict {
                    passed: is_yes(&reasoning),
                    reasoning,
                }
            }
            Err(err) => Verdict {
                passed: false,
                reasoning: format!("Error during LLM evaluation: {err}"),
            },
        }
    }
}

fn judge_prompt(response: &str, expected: &str) -> String {
    format!(
        r#"You are an impartial AI judge. Your task is to evaluate an agent's response based on a given expected content.

Agent's Response: "{response}"
Expected Content/Ground Truth: "{expected}"

Is the Agent's Response correct and relevant compared to the Expected Content?
Focus on the factual accuracy and relevance. It doesn't have to be an exact word-for-word match, but the core information should be present and accurate.

Respond with "{YES}" if it is correct and relevant, or "[[NO]]" if it is not.
After your YES/NO, provide a brief explanation of your reasoning.
"#
    )
}

fn is_yes(reply: &str) -> bool {
    reply.trim_start().starts_with(YES)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sidekick_test_model::{PresetResponse, TestModelProvider};

    use super::*;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("[[YES]] The answer is 12."));
        assert!(is_yes("  [[YES]]"));
        assert!(!is_yes("[[NO]] Wrong number."));
        assert!(!is_yes("Yes, [[YES]]"));
        assert!(!is_yes(""));
    }

    #[test]
    fn test_prompt() {
        let prompt = judge_prompt("It is 12.", "12");
        assert!(prompt.starts_with("You are an impartial AI judge."));
        assert!(prompt.contains("Agent's Response: \"It is 12.\""));
        assert!(prompt.contains("Expected Content/Ground Truth: \"12\""));
    }

    #[tokio::test]
    async fn test_evaluate() {
        let provider = TestModelProvider::default();
        provider.add_response(PresetResponse::text("[[YES]] Correct.\n"));
        provider.add_response(PresetResponse::text("[[NO]] Off topic."));
        provider.add_response(PresetResponse::text("x").with_failures(0));
        let judge = Judge::new(
            ModelClient::new(provider.clone()).with_retry_budget(Duration::ZERO),
        );

        let verdict = judge.evaluate("12", "12").await;
        assert_eq!(
            verdict,
            Verdict {
                passed: true,
                reasoning: "[[YES]] Correct.".to_owned()
            }
        );
        assert!(provider.requests()[0].tools.is_empty());

        assert!(!judge.evaluate("cats", "12").await.passed);

        let verdict = judge.evaluate("12", "12").await;
        assert!(!verdict.passed);
        assert!(verdict.reasoning.starts_with("Error during LLM evaluation"));
    }
}
