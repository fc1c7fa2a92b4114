// Cadence — Language model client
//
// The one outbound network call in the core. `LanguageModel` is the seam the
// retriever calls through; `OpenAiChatModel` speaks the OpenAI-compatible
// chat-completions protocol with the caller's decrypted key as bearer token.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::UpstreamError;

/// Default instruction given to the model.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a music education assistant for a teaching \
studio. Answer the question using the knowledge context when it is relevant, and say so \
when the context does not cover the question.";

/// Everything the model sees for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub context: String,
    pub question: String,
}

impl Prompt {
    pub fn user_message(&self) -> String {
        format!(
            "Knowledge context:\n{}\n\nQuestion: {}",
            self.context, self.question
        )
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, api_key: &str, prompt: &Prompt) -> Result<String, UpstreamError>;
}

// ─── OpenAI-compatible client ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

pub struct OpenAiChatModel {
    http: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OpenAiChatModel {
    /// `endpoint` is the API base, e.g. `https://api.openai.com/v1`.
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn complete(&self, api_key: &str, prompt: &Prompt) -> Result<String, UpstreamError> {
        let user = prompt.user_message();
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: 0.7,
        };

        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| UpstreamError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status { status, body });
        }

        let parsed = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| UpstreamError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| UpstreamError::MalformedResponse("response has no content".to_string()))
    }
}
