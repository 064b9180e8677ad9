//! Minimal OpenAI client backing the generation seam.
//!
//! We only call chat.completions with a single user message and request a strict JSON object.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::GenerationError;
use crate::generation::TextGenerator;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub reasoning_effort: Option<String>,
  pub timeout: Duration,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "o3-mini".into());
    let reasoning_effort = match std::env::var("OPENAI_REASONING_EFFORT") {
      Ok(v) if v.trim().is_empty() => None,
      Ok(v) => Some(v),
      Err(_) => Some("high".into()),
    };
    let timeout = std::env::var("OPENAI_TIMEOUT_SECS")
      .ok()
      .and_then(|v| v.parse::<u64>().ok())
      .map(Duration::from_secs)
      .unwrap_or(Duration::from_secs(300));

    let client = match reqwest::Client::builder().timeout(timeout).build() {
      Ok(c) => c,
      Err(e) => {
        warn!(target: "mcq_bank_backend", error = %e, "Failed to build HTTP client; generation disabled");
        return None;
      }
    };

    Some(Self { client, api_key, base_url, model, reasoning_effort, timeout })
  }

  fn map_transport_error(&self, e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
      GenerationError::Timeout(self.timeout)
    } else {
      GenerationError::Service(e.to_string())
    }
  }
}

#[async_trait]
impl TextGenerator for OpenAI {
  /// JSON-object chat completion; returns the raw message content.
  #[instrument(level = "info", skip(self, instruction), fields(model = %self.model, instruction_len = instruction.len()))]
  async fn complete(&self, instruction: &str) -> Result<String, GenerationError> {
    let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![ChatMessageReq { role: "user".into(), content: instruction.into() }],
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
      reasoning_effort: self.reasoning_effort.clone(),
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "mcq-bank-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| self.map_transport_error(e))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(GenerationError::Http { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| self.map_transport_error(e))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default();
    info!(elapsed = ?start.elapsed(), reply_len = text.len(), "Model response received");

    if text.trim().is_empty() {
      return Err(GenerationError::EmptyReply);
    }
    Ok(text)
  }

  fn describe(&self) -> String {
    format!("openai:{} @ {}", self.model, self.base_url)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  reasoning_effort: Option<String>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
