//! Summarization boundary: styles, lengths, the generator trait, and the
//! size-based tier selection used by automatic summarization.

pub mod client;
pub mod strategy;

pub use client::LlmSummarizer;
pub use strategy::{select_tier, SummaryTier, TierThresholds};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStyle {
    Abstractive,
    Extractive,
    QueryFocused,
}

impl SummaryStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStyle::Abstractive => "abstractive",
            SummaryStyle::Extractive => "extractive",
            SummaryStyle::QueryFocused => "query_focused",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryLength {
    Short,
    Medium,
    Detailed,
}

impl SummaryLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryLength::Short => "short",
            SummaryLength::Medium => "medium",
            SummaryLength::Detailed => "detailed",
        }
    }
}

/// External summarization capability. One bounded call, no internal retries;
/// callers that want retries compose them outside.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn generate(
        &self,
        text: &str,
        style: SummaryStyle,
        length: SummaryLength,
        query: Option<&str>,
    ) -> Result<String>;
}

/// Assemble the system prompt for a summarization request.
///
/// A query-focused request without a query is a caller contract violation and
/// fails here, before any request leaves the process.
pub(crate) fn build_system_prompt(
    style: SummaryStyle,
    length: SummaryLength,
    query: Option<&str>,
) -> Result<String> {
    let mut prompt = format!(
        "You are a highly skilled summarization AI. Your task is to provide a {} summary.",
        length.as_str()
    );

    match style {
        SummaryStyle::Abstractive => {
            prompt.push_str(
                " The summary should be abstractive, meaning you should rephrase and synthesize the information.",
            );
        }
        SummaryStyle::Extractive => {
            prompt.push_str(
                " The summary should be extractive, meaning you should select key sentences directly from the text.",
            );
        }
        SummaryStyle::QueryFocused => match query {
            Some(query) => {
                prompt.push_str(&format!(
                    " The summary should be focused on answering the following query: '{}'.",
                    query
                ));
            }
            None => anyhow::bail!("A query must be provided for query_focused summaries"),
        },
    }

    prompt.push_str(" Ensure the summary is concise, accurate, and captures the main points.");

    match length {
        SummaryLength::Short => {
            prompt.push_str(" Keep the summary very brief, around 1-2 sentences.");
        }
        SummaryLength::Medium => {
            prompt.push_str(" Aim for a summary of 3-5 sentences.");
        }
        SummaryLength::Detailed => {
            prompt.push_str(
                " Provide a comprehensive summary, covering all important aspects, around 5-10 sentences.",
            );
        }
    }

    Ok(prompt)
}
