//! OpenAI-compatible chat-completions client implementing
//! [`CompletionClient`].
//!
//! Speaks the `/chat/completions` wire shape, so it works against OpenAI or
//! any compatible gateway. Requests carry a bounded timeout; a timeout is
//! reported as an ordinary transport error and handled by the caller's
//! fallback policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use solace_core::{
  llm::{CompletionClient, CompletionError, CompletionRequest, ResponseMode},
  message::{ChatMessage, Role},
};

/// Upper bound on a single completion call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmConfig {
  /// e.g. `https://api.openai.com/v1`
  pub base_url: String,
  pub api_key:  String,
  pub model:    String,
}

/// Async client for an OpenAI-compatible chat-completions API.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct OpenAiClient {
  client: reqwest::Client,
  config: LlmConfig,
}

impl OpenAiClient {
  pub fn new(config: LlmConfig) -> Result<Self, CompletionError> {
    let client = reqwest::Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .build()
      .map_err(|e| CompletionError::Transport(e.to_string()))?;
    Ok(Self { client, config })
  }

  fn url(&self) -> String {
    format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
  }
}

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct WireMessage<'a> {
  role:    &'static str,
  content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
  #[serde(rename = "type")]
  kind: &'static str,
}

#[derive(Serialize)]
struct RequestBody<'a> {
  model:       &'a str,
  messages:    Vec<WireMessage<'a>>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens:  Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct ResponseBody {
  choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
  message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
  content: Option<String>,
}

fn wire_role(role: Role) -> &'static str {
  match role {
    Role::User      => "user",
    Role::Assistant => "assistant",
  }
}

fn build_body<'a>(model: &'a str, request: &'a CompletionRequest) -> RequestBody<'a> {
  let mut messages = Vec::with_capacity(request.messages.len() + 1);
  messages.push(WireMessage { role: "system", content: &request.system });
  for ChatMessage { role, content } in &request.messages {
    messages.push(WireMessage { role: wire_role(*role), content });
  }

  RequestBody {
    model,
    messages,
    temperature: request.temperature,
    max_tokens: request.max_tokens,
    response_format: match request.mode {
      ResponseMode::Text      => None,
      ResponseMode::StrictJson => Some(ResponseFormat { kind: "json_object" }),
    },
  }
}

// ─── CompletionClient impl ────────────────────────────────────────────────────

impl CompletionClient for OpenAiClient {
  async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
    let body = build_body(&self.config.model, &request);

    let resp = self
      .client
      .post(self.url())
      .bearer_auth(&self.config.api_key)
      .json(&body)
      .send()
      .await
      .map_err(|e| CompletionError::Transport(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
      let detail = resp.text().await.unwrap_or_default();
      tracing::warn!(%status, "completion request rejected");
      return Err(CompletionError::Transport(format!(
        "POST /chat/completions → {status}: {detail}"
      )));
    }

    let parsed: ResponseBody = resp
      .json()
      .await
      .map_err(|e| CompletionError::Malformed(e.to_string()))?;

    parsed
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message.content)
      .ok_or_else(|| CompletionError::Malformed("no completion choices".to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn request(mode: ResponseMode) -> CompletionRequest {
    CompletionRequest {
      system:      "be brief".into(),
      messages:    vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")],
      temperature: 0.7,
      max_tokens:  Some(500),
      mode,
    }
  }

  #[test]
  fn body_places_system_prompt_first() {
    let req = request(ResponseMode::Text);
    let body = build_body("gpt-4.1-mini", &req);
    assert_eq!(body.messages[0].role, "system");
    assert_eq!(body.messages[0].content, "be brief");
    assert_eq!(body.messages.len(), 3);
    assert_eq!(body.messages[2].role, "assistant");
  }

  #[test]
  fn strict_json_mode_sets_response_format() {
    let req = request(ResponseMode::StrictJson);
    let body = build_body("gpt-4.1-mini", &req);
    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["response_format"]["type"], "json_object");
  }

  #[test]
  fn text_mode_omits_response_format() {
    let req = request(ResponseMode::Text);
    let body = build_body("gpt-4.1-mini", &req);
    let json = serde_json::to_value(&body).unwrap();
    assert!(json.get("response_format").is_none());
  }

  #[test]
  fn response_parsing_takes_first_choice() {
    let parsed: ResponseBody = serde_json::from_str(
      r#"{"choices":[{"message":{"role":"assistant","content":"hello there"}},
          {"message":{"role":"assistant","content":"ignored"}}]}"#,
    )
    .unwrap();
    let content = parsed.choices.into_iter().next().unwrap().message.content;
    assert_eq!(content.as_deref(), Some("hello there"));
  }
}
