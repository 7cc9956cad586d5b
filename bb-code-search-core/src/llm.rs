//! HTTP implementation of [`LlmBackend`] for Ollama and OpenAI-compatible chat endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::contract::{CompletionRequest, LlmBackend};
use crate::error::TranslationError;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// `POST /api/chat`
    #[default]
    Ollama,
    /// `POST /v1/chat/completions`
    #[serde(alias = "openai-compatible")]
    OpenAi,
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(LlmProvider::Ollama),
            "openai" | "openai-compatible" => Ok(LlmProvider::OpenAi),
            other => Err(format!("unsupported LLM provider: {other}")),
        }
    }
}

#[derive(Clone)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
        }
    }
}

impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key_set", &self.api_key.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

pub struct LlmClient {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self, TranslationError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| TranslationError::Transport(e.to_string()))?;
        tracing::info!(
            provider = ?settings.provider,
            base_url = %settings.base_url,
            api_key_set = settings.api_key.is_some(),
            "Initialized LlmClient"
        );
        Ok(Self { http, settings })
    }

    fn endpoint(&self) -> String {
        let base = self.settings.base_url.trim_end_matches('/');
        match self.settings.provider {
            LlmProvider::Ollama => format!("{base}/api/chat"),
            LlmProvider::OpenAi => format!("{base}/v1/chat/completions"),
        }
    }

    fn body(&self, request: &CompletionRequest) -> serde_json::Value {
        let messages = json!([
            { "role": "system", "content": request.system },
            { "role": "user", "content": request.prompt },
        ]);
        match self.settings.provider {
            LlmProvider::Ollama => {
                let mut options = json!({
                    "temperature": request.temperature,
                    "top_p": request.top_p,
                });
                if let Some(num_ctx) = request.num_ctx {
                    options["num_ctx"] = json!(num_ctx);
                }
                json!({
                    "model": request.model,
                    "messages": messages,
                    "stream": false,
                    "format": "json",
                    "options": options,
                })
            }
            LlmProvider::OpenAi => json!({
                "model": request.model,
                "messages": messages,
                "temperature": request.temperature,
                "top_p": request.top_p,
                "stream": false,
            }),
        }
    }

    fn extract_content(&self, text: &str) -> Result<String, TranslationError> {
        let malformed =
            |e: serde_json::Error| TranslationError::MalformedReply(format!("{e}; body={text}"));
        match self.settings.provider {
            LlmProvider::Ollama => {
                let parsed: OllamaChatResponse = serde_json::from_str(text).map_err(malformed)?;
                Ok(parsed.message.content)
            }
            LlmProvider::OpenAi => {
                let parsed: OpenAiChatResponse = serde_json::from_str(text).map_err(malformed)?;
                parsed
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or_else(|| {
                        TranslationError::MalformedReply(format!("no choices in reply: {text}"))
                    })
            }
        }
    }
}

#[async_trait]
impl LlmBackend for LlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, TranslationError> {
        let url = self.endpoint();
        tracing::info!(url = %url, model = %request.model, "Sending LLM chat request");

        let mut builder = self.http.post(&url).json(&self.body(&request));
        if let Some(key) = &self.settings.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder.send().await.map_err(|e| {
            tracing::error!(error = ?e, url = %url, "Failed to reach LLM service");
            if e.is_timeout() {
                TranslationError::Timeout(e.to_string())
            } else {
                TranslationError::Transport(e.to_string())
            }
        })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                TranslationError::Timeout(e.to_string())
            } else {
                TranslationError::Transport(e.to_string())
            }
        })?;

        if !status.is_success() {
            tracing::error!(status = %status, url = %url, "LLM service returned error. Response body: {text}");
            return Err(TranslationError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        self.extract_content(&text)
    }
}
