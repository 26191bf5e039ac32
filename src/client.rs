use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::BoxError;
use crate::pipeline::{RawTranslation, SegmentTranslator, TranslationOptions, Usage};

pub const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
pub const DEFAULT_MODEL: &str = "qwen-mt-plus";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned error status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response has no choices")]
    NoChoices,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    translation_options: &'a TranslationOptions,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

impl From<ApiUsage> for Usage {
    fn from(u: ApiUsage) -> Self {
        Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

/// Blocking client for Qwen-MT behind an OpenAI-compatible chat endpoint.
///
/// One request per call; retries and rate limiting are left to callers.
pub struct QwenMtClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl QwenMtClient {
    pub fn new(
        api_key: &str,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn translate(
        &self,
        text: &str,
        options: &TranslationOptions,
    ) -> Result<RawTranslation, ClientError> {
        let req = build_request(&self.model, text, options);
        if tracing::enabled!(tracing::Level::DEBUG) {
            if let Ok(json) = serde_json::to_string(options) {
                tracing::debug!(translation_options = %json, chars = text.chars().count(), "sending request");
            }
        }

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let res: ChatResponse = response.json()?;
        into_raw(res)
    }
}

impl SegmentTranslator for QwenMtClient {
    fn translate_segment(
        &self,
        text: &str,
        options: &TranslationOptions,
    ) -> Result<RawTranslation, BoxError> {
        Ok(self.translate(text, options)?)
    }
}

fn build_request<'a>(model: &'a str, text: &'a str, options: &'a TranslationOptions) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: text,
        }],
        translation_options: options,
        stream: false,
    }
}

fn into_raw(res: ChatResponse) -> Result<RawTranslation, ClientError> {
    let choice = res.choices.into_iter().next().ok_or(ClientError::NoChoices)?;
    Ok(RawTranslation {
        text: choice.message.content.unwrap_or_default(),
        usage: res.usage.unwrap_or_default().into(),
    })
}
