use sidekick_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

use crate::search::SearchClient;

#[derive(Deserialize, JsonSchema)]
pub struct SearchParameters {
    #[schemars(description = "The search query.")]
    query: String,
}

/// A tool for searching the web with DuckDuckGo.
pub struct DuckDuckGoSearchTool {
    client: SearchClient,
    parameter_schema: Value,
}

impl DuckDuckGoSearchTool {
    /// Creates a new search tool.
    #[inline]
    pub fn new(client: SearchClient) -> Self {
        DuckDuckGoSearchTool {
            client,
            parameter_schema: schema_for!(SearchParameters).to_value(),
        }
    }
}

impl Tool for DuckDuckGoSearchTool {
    type Input = SearchParameters;

    fn name(&self) -> &str {
        "duckduckgo_search"
    }

    fn description(&self) -> &str {
        r#"
A wrapper around DuckDuckGo Search.
Useful for when you need to answer questions about current events.
Input should be a search query."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: SearchParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let client = self.client.clone();
        async move {
            client.search(&input.query).await.map_err(|err| {
                ToolError::execution_error().with_reason(format!("{err}"))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use sidekick_core::tool::ErrorKind;

    use super::*;

    #[tokio::test]
    async fn test_search_failure() {
        // Nothing listens on port 9 of the loopback interface.
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let tool = DuckDuckGoSearchTool::new(SearchClient::with_client(
            client,
            "http://127.0.0.1:9/",
        ));
        let err = tool
            .execute(SearchParameters {
                query: "rust".to_owned(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExecutionError);
        assert!(err.reason().starts_with("search request failed"));
    }
}
