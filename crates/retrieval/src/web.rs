//! Web search used by the fallback tier.

use async_trait::async_trait;
use ragfall_core::{AppError, AppResult};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebResult {
    pub title: String,
    pub body: String,
}

impl WebResult {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Trait for web search providers.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Search `query` and flatten at most `max_results` hits into one string.
    ///
    /// No hits is an empty string, not an error.
    async fn retrieve_web(&self, query: &str, max_results: usize) -> AppResult<String>;
}

/// Format hits as `[title] body`, space-separated, provider order kept.
pub fn format_results(results: &[WebResult], max_results: usize) -> String {
    results
        .iter()
        .take(max_results)
        .map(|r| format!("[{}] {}", r.title, r.body))
        .collect::<Vec<_>>()
        .join(" ")
}

/// DuckDuckGo Instant Answer API client.
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

/// Either a plain topic or a named group of topics.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
    Topic {
        #[serde(rename = "Text", default)]
        text: String,
    },
}

impl DuckDuckGoSearch {
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    /// Share an existing HTTP connection pool.
    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn retrieve_web(&self, query: &str, max_results: usize) -> AppResult<String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| AppError::WebSearch(format!("Search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::WebSearch(format!(
                "Search provider returned {}: {}",
                status, body
            )));
        }

        // The API answers with `application/x-javascript`, so decode by hand.
        let body = response
            .text()
            .await
            .map_err(|e| AppError::WebSearch(format!("Failed to read search response: {}", e)))?;
        let answer: InstantAnswer = serde_json::from_str(&body)
            .map_err(|e| AppError::WebSearch(format!("Invalid search response: {}", e)))?;

        let results = results_from_answer(answer);
        tracing::debug!("Web search returned {} results", results.len());
        Ok(format_results(&results, max_results))
    }
}

fn results_from_answer(answer: InstantAnswer) -> Vec<WebResult> {
    let mut results = Vec::new();

    if !answer.abstract_text.is_empty() {
        results.push(WebResult::new(answer.heading, answer.abstract_text));
    }

    let mut texts = Vec::new();
    flatten_topics(answer.related_topics, &mut texts);
    results.extend(texts.into_iter().map(|text| {
        let title = text
            .split_once(" - ")
            .map(|(title, _)| title.to_string())
            .unwrap_or_else(|| text.clone());
        WebResult::new(title, text)
    }));

    results
}

fn flatten_topics(topics: Vec<RelatedTopic>, out: &mut Vec<String>) {
    for topic in topics {
        match topic {
            RelatedTopic::Group { topics } => flatten_topics(topics, out),
            RelatedTopic::Topic { text } if !text.is_empty() => out.push(text),
            RelatedTopic::Topic { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_results() {
        let results = vec![
            WebResult::new("Parigi", "Capitale della Francia."),
            WebResult::new("Francia", "Stato europeo."),
            WebResult::new("Lione", "Città francese."),
        ];
        assert_eq!(
            format_results(&results, 2),
            "[Parigi] Capitale della Francia. [Francia] Stato europeo."
        );
        assert_eq!(format_results(&results, 0), "");
        assert_eq!(format_results(&[], 3), "");
    }

    #[test]
    fn test_results_from_answer_flattens_groups() {
        let answer: InstantAnswer = serde_json::from_str(
            r#"{
                "Heading": "Paris",
                "AbstractText": "Paris is the capital of France.",
                "RelatedTopics": [
                    {"Text": "Paris 2024 - Summer Olympics held in Paris.", "FirstURL": "x"},
                    {"Name": "Places", "Topics": [
                        {"Text": "Île de la Cité - Island in the Seine."}
                    ]},
                    {"Text": ""}
                ]
            }"#,
        )
        .unwrap();

        let results = results_from_answer(answer);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], WebResult::new("Paris", "Paris is the capital of France."));
        assert_eq!(results[1].title, "Paris 2024");
        assert_eq!(results[1].body, "Paris 2024 - Summer Olympics held in Paris.");
        assert_eq!(results[2].title, "Île de la Cité");
    }

    #[test]
    fn test_empty_answer_formats_to_empty_string() {
        let answer: InstantAnswer =
            serde_json::from_str(r#"{"Heading": "", "AbstractText": "", "RelatedTopics": []}"#)
                .unwrap();
        assert_eq!(format_results(&results_from_answer(answer), 3), "");
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_web_search_error() {
        let search = DuckDuckGoSearch::with_endpoint("http://127.0.0.1:9/");
        let err = search.retrieve_web("Parigi", 3).await.unwrap_err();
        assert!(matches!(err, AppError::WebSearch(_)));
    }
}
