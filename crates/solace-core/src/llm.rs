//! The `CompletionClient` trait — seam to the language-model service.
//!
//! Every model call in the pipeline is fail-soft: callers receive a
//! `Result` and define their own fallback value at the call site (empty
//! profile for extraction, fixed apology string for replies). Errors never
//! surface to the end user.

use std::future::Future;

use thiserror::Error;

use crate::message::ChatMessage;

/// How the model should shape its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
  /// Free-form text, used for coaching replies.
  Text,
  /// The model must return a single valid JSON object, used for extraction.
  StrictJson,
}

/// One completion call: a system instruction plus the conversation so far.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
  pub system:      String,
  pub messages:    Vec<ChatMessage>,
  pub temperature: f32,
  pub max_tokens:  Option<u32>,
  pub mode:        ResponseMode,
}

#[derive(Debug, Error)]
pub enum CompletionError {
  /// Network failure, timeout, or non-success HTTP status.
  #[error("completion transport error: {0}")]
  Transport(String),

  /// The service answered but the payload was not usable.
  #[error("malformed completion response: {0}")]
  Malformed(String),
}

/// A chat-completion backend.
pub trait CompletionClient: Send + Sync {
  /// Send `request` and return the completion text.
  fn complete(
    &self,
    request: CompletionRequest,
  ) -> impl Future<Output = Result<String, CompletionError>> + Send + '_;
}
