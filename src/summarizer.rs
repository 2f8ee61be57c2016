use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SummarizeError;
use crate::types::EmailMessage;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const MODEL: &str = "gpt-4o-mini";

// Keep the prompt lightweight.
const MAX_BODY_CHARS: usize = 4000;

// Generation seam so the summarize flow can run against a stub. Every call
// is stateless and independent; there is no multi-turn context.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, SummarizeError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
}

#[derive(Serialize)]
struct ChatRequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
pub struct ChatChoice {
    pub message: ChatResponseMessage,
}

#[derive(Deserialize)]
pub struct ChatResponseMessage {
    pub content: String,
}

/// OpenAI chat-completions backend.
pub struct OpenAiGenerator {
    http: reqwest::Client,
    api_key: String,
}

impl OpenAiGenerator {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self { http, api_key }
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, SummarizeError> {
        let request = ChatRequest {
            model: MODEL,
            messages: vec![ChatRequestMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(OPENAI_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(SummarizeError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SummarizeError::Rejected { status, detail });
        }

        let body: ChatResponse = response.json().await.map_err(SummarizeError::Http)?;
        extract_completion(body)
    }
}

// The first completion's text, trimmed. Zero completions is an error, not an
// empty summary.
pub fn extract_completion(response: ChatResponse) -> Result<String, SummarizeError> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.trim().to_string())
        .ok_or(SummarizeError::NoCompletion)
}

pub fn build_prompt(message: &EmailMessage) -> String {
    let body_preview: String = message.body.chars().take(MAX_BODY_CHARS).collect();
    format!(
        "Summarize the following email in three concise bullet points. \
         Highlight the sender intent and any action items.\n\n\
         From: {}\nSubject: {}\nBody:\n{}",
        message.sender, message.subject, body_preview
    )
}

pub async fn summarize<G: TextGenerator + ?Sized>(
    generator: &G,
    message: &EmailMessage,
) -> Result<String, SummarizeError> {
    generator.generate(&build_prompt(message)).await
}
