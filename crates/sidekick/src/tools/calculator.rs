use std::future::ready;

use sidekick_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

use crate::calc::evaluate;

#[derive(Deserialize, JsonSchema)]
pub struct CalculatorParameters {
    #[schemars(description = "The expression to evaluate, e.g. \"2 + 2 * 5\".")]
    expression: String,
}

/// A tool for evaluating arithmetic expressions.
pub struct CalculatorTool {
    parameter_schema: Value,
}

impl CalculatorTool {
    /// Creates a new calculator tool.
    #[inline]
    pub fn new() -> Self {
        CalculatorTool {
            parameter_schema: schema_for!(CalculatorParameters).to_value(),
        }
    }
}

impl Default for CalculatorTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for CalculatorTool {
    type Input = CalculatorParameters;

    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        r#"
Evaluates a mathematical expression.
Useful for performing calculations.
Input must be a valid mathematical expression string (e.g., "2 + 2 * 5").
Supports + - * / // % **, parentheses and abs, sqrt, exp, log, log10, sin, cos, tan."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: CalculatorParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let expression = input.expression;
        ready(evaluate(&expression).map_err(|err| {
            ToolError::evaluation_error().with_reason(format!(
                "Error evaluating expression '{expression}': {err}"
            ))
        }))
    }
}
