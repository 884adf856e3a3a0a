//! LLM-backed summarizer over an OpenRouter-compatible chat completions API.

use super::{build_system_prompt, Summarizer, SummaryLength, SummaryStyle};
use crate::config::Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct LlmSummarizer {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl LlmSummarizer {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for summarizer")?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.openrouter_endpoint.clone(),
            config.summarizer_model.clone(),
            config.openrouter_api_key.clone(),
            Duration::from_secs(config.summarizer_timeout_seconds),
        )
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn generate(
        &self,
        text: &str,
        style: SummaryStyle,
        length: SummaryLength,
        query: Option<&str>,
    ) -> Result<String> {
        let system_prompt = build_system_prompt(style, length, query)?;
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!("Please summarize the following text:\n\n{}", text),
                },
            ],
        };

        debug!(
            "Requesting {} {} summary ({} chars of input)",
            length.as_str(),
            style.as_str(),
            text.chars().count()
        );

        let mut request = self.http.post(self.completions_url()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .context("Summarization request failed")?
            .error_for_status()
            .context("Summarization backend returned an error status")?;

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse summarization response")?;

        let summary = parsed
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .unwrap_or_default();

        if summary.is_empty() {
            anyhow::bail!("Summarization backend returned an empty completion");
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(endpoint: &str) -> LlmSummarizer {
        LlmSummarizer::new(
            endpoint,
            "openai/gpt-4o-mini",
            Some("test-key".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_parses_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"role":"assistant","content":"  A concise summary.  "}}]}"#,
            )
            .create_async()
            .await;

        let client = test_client(&server.url());
        let summary = client
            .generate(
                "some long text",
                SummaryStyle::Abstractive,
                SummaryLength::Medium,
                None,
            )
            .await
            .unwrap();

        assert_eq!(summary, "A concise summary.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_completion_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"   "}}]}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let result = client
            .generate("text", SummaryStyle::Extractive, SummaryLength::Short, None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_error_status_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let result = client
            .generate("text", SummaryStyle::Abstractive, SummaryLength::Medium, None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_query_focused_without_query_never_sends_a_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .expect(0)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let result = client
            .generate("text", SummaryStyle::QueryFocused, SummaryLength::Medium, None)
            .await;

        assert!(result.is_err());
        mock.assert_async().await;
    }
}
