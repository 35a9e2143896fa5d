use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, Result};

/// Returned in place of a summary whenever the API call fails.
pub const FALLBACK_SUMMARY: &str = "Failed to generate summary. Please try again later.";

const SYSTEM_PROMPT: &str = "You are a helpful assistant that summarizes web pages.";
const MAX_INPUT_CHARS: usize = 10_000;

#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Option<Duration>,
}

impl From<&Config> for SummarizerConfig {
    fn from(config: &Config) -> Self {
        Self {
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout: config.request_timeout(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

/// Only `content` is read back; providers differ on the other fields.
#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

pub struct Summarizer {
    client: Client,
    config: SummarizerConfig,
}

impl Summarizer {
    pub fn new(config: SummarizerConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self { client, config })
    }

    /// Summarize `text` taken from `source_url`.
    ///
    /// Never fails: any API or transport error is logged and replaced by
    /// [`FALLBACK_SUMMARY`] so the caller always has something to persist.
    pub async fn summarize(&self, text: &str, source_url: &str) -> String {
        match self.request_summary(text, source_url).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!("API call failed for {}: {}", source_url, e);
                FALLBACK_SUMMARY.to_string()
            }
        }
    }

    async fn request_summary(&self, text: &str, source_url: &str) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("no API key configured".to_string()))?;

        let user_message = format!(
            "Please summarize the following text from {} in a concise manner:\n\n{}",
            source_url,
            truncate_chars(text, MAX_INPUT_CHARS)
        );

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user_message,
                },
            ],
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Api(format!("HTTP error! status: {}", response.status())));
        }

        let chat_response: ChatResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AppError::Api("response contained no choices".to_string()))
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
