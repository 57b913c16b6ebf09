//! Web search through the DuckDuckGo Instant Answer API.

use reqwest::{Client, Url};
use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::Value;

/// Returned when the API has nothing to say about a query.
pub const NO_RESULTS: &str = "No good DuckDuckGo Search Result was found";

const MAX_RELATED_TOPICS: usize = 5;

/// Errors raised by [`SearchClient::search`].
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The endpoint is not a valid URL.
    #[error("invalid search endpoint: {0}")]
    Endpoint(String),
    /// The request failed or the payload couldn't be parsed.
    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// A client for the Instant Answer API.
#[derive(Clone, Debug)]
pub struct SearchClient {
    client: Client,
    endpoint: String,
}

impl SearchClient {
    /// Creates a client for `endpoint`, e.g. `https://api.duckduckgo.com/`.
    #[inline]
    pub fn new<S: Into<String>>(endpoint: S) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    /// Creates a client that sends requests through `client`.
    #[inline]
    pub fn with_client<S: Into<String>>(client: Client, endpoint: S) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Searches for `query` and returns the snippets as text.
    pub async fn search(&self, query: &str) -> Result<String, SearchError> {
        let url = Url::parse_with_params(
            &self.endpoint,
            &[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ],
        )
        .map_err(|err| SearchError::Endpoint(err.to_string()))?;
        debug!("searching: {url}");

        let answer: InstantAnswer = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(answer.summarize().unwrap_or_else(|| NO_RESULTS.to_owned()))
    }
}

#[derive(Debug, Default, Deserialize)]
struct InstantAnswer {
    #[serde(rename = "Heading", default)]
    heading: String,
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    // Usually a string, but some answer types carry an object.
    #[serde(rename = "Answer", default)]
    answer: Value,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Topic {
        #[serde(rename = "Text")]
        text: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
    Other(IgnoredAny),
}

impl RelatedTopic {
    fn collect_texts<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            RelatedTopic::Topic { text } if !text.is_empty() => out.push(text),
            RelatedTopic::Group { topics } => {
                for topic in topics {
                    topic.collect_texts(out);
                }
            }
            _ => {}
        }
    }
}

impl InstantAnswer {
    fn summarize(&self) -> Option<String> {
        let mut sections = vec![];

        if !self.abstract_text.is_empty() {
            let mut section = String::new();
            if !self.heading.is_empty() {
                section.push_str(&self.heading);
                section.push_str(": ");
            }
            section.push_str(&self.abstract_text);
            if !self.abstract_url.is_empty() {
                section.push_str(&format!(" ({})", self.abstract_url));
            }
            sections.push(section);
        }

        if let Some(answer) = self.answer.as_str().filter(|a| !a.is_empty()) {
            sections.push(format!("Answer: {answer}"));
        }

        let mut texts = vec![];
        for topic in &self.related_topics {
            topic.collect_texts(&mut texts);
        }
        if !texts.is_empty() {
            let mut section = "Related:".to_owned();
            for text in texts.into_iter().take(MAX_RELATED_TOPICS) {
                section.push_str("\n- ");
                section.push_str(text);
            }
            sections.push(section);
        }

        if sections.is_empty() {
            None
        } else {
            Some(sections.join("\n\n"))
        }
    }
}
