//! Per-case results and the run summary.

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context as _, Result};
use serde::Serialize;

use crate::scenario::ToolCallRecord;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Passed,
    Failed,
    Error,
}

impl Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Passed => "PASSED",
            Status::Failed => "FAILED",
            Status::Error => "ERROR",
        })
    }
}

/// What happened in one test case.
#[derive(Clone, Debug, Serialize)]
pub struct CaseResult {
    pub name: String,
    pub user_input: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub status: Status,
}

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Completed {
        final_response: String,
        actual_tool_calls: Vec<ToolCallRecord>,
        expected_tool_calls: Vec<ToolCallRecord>,
        expected_response_evaluated_against: String,
        response_is_correct_llm: bool,
        llm_reasoning: String,
        tool_calls_match: bool,
    },
    Errored {
        error: String,
    },
}

/// All results, keyed by scenario file name.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct Report {
    pub scenarios: BTreeMap<String, Vec<CaseResult>>,
}

impl Report {
    /// Writes the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("cannot write {}", path.display()))
    }

    pub fn summary(&self, duration: Duration) -> Summary {
        let results = self.scenarios.values().flatten();
        let cases = results.clone().count();
        let passed = results.filter(|r| r.status == Status::Passed).count();
        Summary {
            files: self.scenarios.len(),
            cases,
            passed,
            duration,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Summary {
    pub files: usize,
    pub cases: usize,
    pub passed: usize,
    pub duration: Duration,
}

impl Summary {
    #[inline]
    pub fn failed(&self) -> usize {
        self.cases - self.passed
    }

    /// Percentage of passed cases, 0 when there are none.
    pub fn pass_rate(&self) -> f64 {
        if self.cases == 0 {
            0.0
        } else {
            self.passed as f64 / self.cases as f64 * 100.0
        }
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Test Files: {}", self.files)?;
        writeln!(f, "Total Test Cases: {}", self.cases)?;
        writeln!(f, "Tests Passed: {}", self.passed)?;
        writeln!(f, "Tests Failed: {}", self.failed())?;
        writeln!(f, "Pass Rate: {:.2}%", self.pass_rate())?;
        write!(f, "Duration: {:.2?}", self.duration)
    }
}
