//! Handler for `POST /sessions/:token/messages` — one coaching turn.

use axum::{
  Json,
  extract::{Path, State},
};
use serde::Deserialize;
use solace_core::{llm::CompletionClient, store::WellnessStore};

use crate::{AppState, error::ApiError, pipeline};

/// Inclusive bounds on user message length, in characters.
pub const MESSAGE_MIN_CHARS: usize = 1;
pub const MESSAGE_MAX_CHARS: usize = 5000;

#[derive(Debug, Deserialize)]
pub struct SendBody {
  pub message: String,
}

/// `POST /sessions/:token/messages` — body: `{"message":"..."}`
pub async fn send<S, C>(
  State(state): State<AppState<S, C>>,
  Path(token): Path<String>,
  Json(body): Json<SendBody>,
) -> Result<Json<pipeline::TurnReply>, ApiError>
where
  S: WellnessStore,
  C: CompletionClient,
{
  let chars = body.message.chars().count();
  if chars < MESSAGE_MIN_CHARS || body.message.trim().is_empty() {
    return Err(ApiError::BadRequest("message must not be empty".into()));
  }
  if chars > MESSAGE_MAX_CHARS {
    return Err(ApiError::BadRequest(format!(
      "message exceeds {MESSAGE_MAX_CHARS} characters"
    )));
  }

  let reply = pipeline::run_turn(&state, &token, &body.message).await?;
  Ok(Json(reply))
}
