//! Text summarization using the Gemini API, and web page fetching.
//!
//! Both clients are reached through traits so the command router can be
//! exercised without network access.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};

/// Upper bound on the text handed to the summarizer.
pub const MAX_SUMMARY_INPUT_CHARS: usize = 20_000;

/// Prompt template; `{text}` is replaced by the user's text.
const SUMMARY_PROMPT: &str = "You are a reliable summarizer. Write a short, substantive summary \
of the following text. Respond in the same language as the text itself: \"{text}\"";

/// Produces summaries of free text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarizes `text`.
    async fn summarize(&self, text: &str) -> Result<String>;
}

/// Retrieves the readable text of a web page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url` and returns its text content.
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

/// Gemini `generateContent` request body.
#[derive(Debug, Clone, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// Gemini `generateContent` response body.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

/// Gemini-backed [`Summarizer`].
#[derive(Clone)]
pub struct GeminiSummarizer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl GeminiSummarizer {
    /// Creates a summarizer for `model` at `api_url`.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_url, self.model)
    }
}

/// Builds the summarization prompt, truncating oversized input.
pub fn build_prompt(text: &str) -> String {
    let text: String = text.chars().take(MAX_SUMMARY_INPUT_CHARS).collect();
    SUMMARY_PROMPT.replace("{text}", &text)
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_prompt(text),
                }],
            }],
        };

        debug!(model = %self.model, chars = text.len(), "Sending summarization request");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| CoreError::Summarization(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(|e| {
                warn!(status = %status, error = %e, "Failed to read Gemini error body");
                CoreError::Summarization(format!(
                    "Gemini API returned {} with an unreadable body: {}",
                    status, e
                ))
            })?;
            warn!(status = %status, "Gemini API returned an error status");
            return Err(CoreError::Summarization(format!(
                "Gemini API returned {}: {}",
                status, body
            )));
        }

        let response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| CoreError::Summarization(format!("failed to parse response: {}", e)))?;

        let summary = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| CoreError::Summarization("no summary in response".to_string()))?;

        info!(model = %self.model, "Received summary from Gemini");
        Ok(summary)
    }
}

/// Plain HTTP [`PageFetcher`].
#[derive(Clone)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    /// Creates a fetcher whose requests are bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CoreError::PageFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "Page fetch returned an error status");
            return Err(CoreError::PageFetch(format!("{} returned {}", url, status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CoreError::PageFetch(e.to_string()))?;

        debug!(url = %url, bytes = body.len(), "Fetched page");
        Ok(html_to_text(&body))
    }
}

fn script_style_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|noscript)\b.*?</(script|style|noscript)>")
            .expect("Invalid regex pattern")
    })
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("Invalid regex pattern"))
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"))
}

/// Reduces an HTML document to its visible text.
///
/// Plain-text bodies pass through with whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    let without_scripts = script_style_regex().replace_all(html, " ");
    let without_tags = tag_regex().replace_all(&without_scripts, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    whitespace_regex().replace_all(&decoded, " ").trim().to_string()
}
