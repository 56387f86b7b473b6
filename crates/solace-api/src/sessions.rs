//! Handlers for `/sessions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/sessions` | Create an anonymous session; no auth, no body required |
//! | `GET`  | `/sessions/:token` | 404 if unknown, 410 if expired |

use axum::{
  Json,
  extract::{Path, State},
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solace_core::{
  llm::CompletionClient,
  message::ChatMessage,
  profile::ExtractedProfile,
  session::{Session, SessionMetadata, SessionStatus},
  store::WellnessStore,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError, token};

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
  pub referrer: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
  pub session_token: String,
  pub session_id:    Uuid,
  pub expires_at:    DateTime<Utc>,
}

/// `POST /sessions` — issue a fresh anonymous session.
pub async fn create<S, C>(
  State(state): State<AppState<S, C>>,
  headers: HeaderMap,
  body: Option<Json<CreateBody>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: WellnessStore,
  C: CompletionClient,
{
  let Json(body) = body.unwrap_or_default();

  let header_str = |name: &str| {
    headers
      .get(name)
      .and_then(|v| v.to_str().ok())
      .map(str::to_string)
  };

  let metadata = SessionMetadata {
    ip_address: header_str("x-forwarded-for"),
    user_agent: header_str("user-agent"),
    referrer:   body.referrer.or_else(|| header_str("referer")),
  };

  let session = Session::issue(token::generate(), metadata, Utc::now());
  state.store.insert_session(&session).await.map_err(ApiError::store)?;

  tracing::info!(session_id = %session.session_id, "session created");

  Ok((
    StatusCode::CREATED,
    Json(CreatedSession {
      session_token: session.token,
      session_id:    session.session_id,
      expires_at:    session.expires_at,
    }),
  ))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// Read model for a session, omitting internals like raw request metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
  pub session_id:       Uuid,
  pub status:           SessionStatus,
  pub created_at:       DateTime<Utc>,
  pub expires_at:       DateTime<Utc>,
  pub message_count:    u32,
  pub engagement_score: u8,
  pub transcript:       Vec<ChatMessage>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub extracted_data:   Option<ExtractedProfile>,
}

/// `GET /sessions/:token`
pub async fn get_one<S, C>(
  State(state): State<AppState<S, C>>,
  Path(token): Path<String>,
) -> Result<Json<SessionView>, ApiError>
where
  S: WellnessStore,
  C: CompletionClient,
{
  let now = Utc::now();
  let session = state
    .store
    .get_session(&token)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("session not found".into()))?;
  session.ensure_active(now)?;

  Ok(Json(SessionView {
    session_id:       session.session_id,
    status:           session.status(now),
    created_at:       session.created_at,
    expires_at:       session.expires_at,
    message_count:    session.message_count,
    engagement_score: session.engagement_score,
    transcript:       session.transcript,
    extracted_data:   if session.extracted.is_empty() {
      None
    } else {
      Some(session.extracted)
    },
  }))
}
