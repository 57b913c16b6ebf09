//! Scenario files and ground truth.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sidekick_model::ToolCallRequest;

/// A tool call as written in scenario files and reports.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl From<&ToolCallRequest> for ToolCallRecord {
    fn from(req: &ToolCallRequest) -> Self {
        Self {
            name: req.name.clone(),
            args: req.arguments.clone(),
        }
    }
}

/// One test case in a scenario file.
#[derive(Clone, Debug, Deserialize)]
pub struct TestCase {
    pub name: Option<String>,
    pub user_input: String,
    #[serde(default)]
    pub expected_tool_calls: Vec<ToolCallRecord>,
    #[serde(default)]
    pub expected_response_contains: String,
}

/// A parsed scenario file.
#[derive(Debug)]
pub struct ScenarioFile {
    pub file_name: String,
    pub cases: Vec<TestCase>,
}

/// Loads every `*.json` file in `dir`, ordered by file name.
pub fn load_scenarios(dir: &Path) -> Result<Vec<ScenarioFile>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("cannot read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.is_file()
                && path.extension().is_some_and(|ext| ext == "json")
        })
        .collect();
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            let cases: Vec<TestCase> = serde_json::from_str(&text)
                .with_context(|| format!("invalid scenario {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(ScenarioFile { file_name, cases })
        })
        .collect()
}

/// Reference descriptions for images, keyed by their placeholder
/// `description for image N`.
#[derive(Debug, Default)]
pub struct GroundTruth {
    descriptions: HashMap<String, String>,
}

impl GroundTruth {
    /// Reads every `image-N-description.txt` in `dir`. A missing directory
    /// yields no descriptions.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut descriptions = HashMap::new();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("no ground truth descriptions in {}: {err}", dir.display());
                return Ok(Self::default());
            }
        };
        for entry in entries {
            let path = entry?.path();
            let Some(index) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(description_index)
            else {
                continue;
            };
            let text = fs::read_to_string(&path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            descriptions.insert(
                format!("description for image {index}"),
                text.trim().to_owned(),
            );
        }
        Ok(Self { descriptions })
    }

    /// Replaces a placeholder with its description, anything else is
    /// returned unchanged.
    pub fn resolve<'a>(&'a self, expected: &'a str) -> &'a str {
        self.descriptions
            .get(expected)
            .map(String::as_str)
            .unwrap_or(expected)
    }
}

fn description_index(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix("image-")?
        .strip_suffix("-description.txt")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_load_scenarios() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("b_math.json"),
            json!([{
                "name": "Basic arithmetic",
                "user_input": "What is 2 + 2 * 5?",
                "expected_tool_calls": [
                    { "name": "calculator", "args": { "expression": "2 + 2 * 5" } }
                ],
                "expected_response_contains": "12"
            }])
            .to_string(),
        )
        .unwrap();
        fs::write(
            dir.path().join("a_chat.json"),
            json!([{ "user_input": "Hello" }]).to_string(),
        )
        .unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let files = load_scenarios(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].file_name, "a_chat.json");
        assert_eq!(files[0].cases[0].name, None);
        assert!(files[0].cases[0].expected_tool_calls.is_empty());
        assert_eq!(files[1].cases[0].expected_tool_calls[0].name, "calculator");
    }

    #[test]
    fn test_invalid_scenario() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), "{").unwrap();
        assert!(load_scenarios(dir.path()).is_err());
    }

    #[test]
    fn test_ground_truth() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("image-1-description.txt"),
            "A cat on a sofa.\n",
        )
        .unwrap();
        fs::write(dir.path().join("image-1.png"), "").unwrap();

        let truth = GroundTruth::load(dir.path()).unwrap();
        assert_eq!(truth.resolve("description for image 1"), "A cat on a sofa.");
        assert_eq!(truth.resolve("description for image 2"), "description for image 2");
        assert_eq!(truth.resolve("12"), "12");

        let missing = GroundTruth::load(&dir.path().join("nope")).unwrap();
        assert_eq!(missing.resolve("description for image 1"), "description for image 1");
    }

    #[test]
    fn test_description_index() {
        assert_eq!(description_index("image-12-description.txt"), Some(12));
        assert_eq!(description_index("image-x-description.txt"), None);
        assert_eq!(description_index("image-1.png"), None);
    }
}
