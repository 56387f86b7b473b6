//! Conversion and passwordless-login handlers.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/sessions/:token/convert` | Body: `{"email":"...","name":...}` |
//! | `GET`  | `/auth/magic?token=...` | Redeem a magic link (single use) |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use solace_core::{
  llm::CompletionClient,
  session::validate_email,
  store::{MagicLink, NewUser, WellnessStore},
};
use uuid::Uuid;

use crate::{AppState, error::ApiError, token};

/// Magic links expire fifteen minutes after issue.
const MAGIC_LINK_TTL_MINUTES: i64 = 15;

// ─── Convert ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ConvertBody {
  pub email: String,
  pub name:  Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Converted {
  pub user_id:        Uuid,
  /// Present only when a new account (and client profile) was created.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub client_id:      Option<Uuid>,
  pub magic_link_url: String,
}

/// `POST /sessions/:token/convert` — turn the anonymous session into an
/// account.
///
/// Idempotence guard lives in the store: the conversion columns are written
/// with a guarded update, so exactly one of two racing calls wins and the
/// loser gets `409 Conflict`.
pub async fn convert<S, C>(
  State(state): State<AppState<S, C>>,
  Path(session_token): Path<String>,
  Json(body): Json<ConvertBody>,
) -> Result<Json<Converted>, ApiError>
where
  S: WellnessStore,
  C: CompletionClient,
{
  let email = body.email.trim().to_lowercase();
  validate_email(&email)?;

  let _guard = state.locks.acquire(&session_token).await;

  let now = Utc::now();
  let session = state
    .store
    .get_session(&session_token)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("session not found".into()))?;
  session.ensure_active(now)?;
  if session.is_converted() {
    return Err(ApiError::AlreadyConverted);
  }

  // Reuse an existing account for this email, otherwise create the account
  // and its client profile in one transaction.
  let (user, client_id) =
    match state.store.find_user_by_email(&email).await.map_err(ApiError::store)? {
      Some(user) => (user, None),
      None => {
        let new_user = NewUser {
          email: email.clone(),
          name:  body.name.or_else(|| session.extracted.display_name()),
        };
        let (user, profile) = state
          .store
          .create_account(
            new_user,
            session.extracted.primary_goal.clone(),
            Some(session.session_id),
          )
          .await
          .map_err(ApiError::store)?;
        (user, Some(profile.client_id))
      }
    };

  let won = state
    .store
    .mark_session_converted(session.session_id, user.user_id, now)
    .await
    .map_err(ApiError::store)?;
  if !won {
    return Err(ApiError::AlreadyConverted);
  }

  let link = MagicLink {
    token:      token::generate(),
    email:      email.clone(),
    expires_at: now + Duration::minutes(MAGIC_LINK_TTL_MINUTES),
  };
  state.store.insert_magic_link(&link).await.map_err(ApiError::store)?;

  tracing::info!(
    session_id = %session.session_id,
    user_id = %user.user_id,
    "session converted",
  );

  Ok(Json(Converted {
    user_id: user.user_id,
    client_id,
    magic_link_url: format!(
      "{}/api/auth/magic?token={}",
      state.config.base_url.trim_end_matches('/'),
      link.token,
    ),
  }))
}

// ─── Magic-link redemption ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MagicParams {
  pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Redeemed {
  pub email:   String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub user_id: Option<Uuid>,
}

/// `GET /auth/magic?token=...`
///
/// Unknown, expired, and already-used tokens are indistinguishable to the
/// caller.
pub async fn redeem_magic<S, C>(
  State(state): State<AppState<S, C>>,
  Query(params): Query<MagicParams>,
) -> Result<Json<Redeemed>, ApiError>
where
  S: WellnessStore,
  C: CompletionClient,
{
  let now = Utc::now();
  let link = state
    .store
    .consume_magic_link(&params.token, now)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("magic link is invalid or expired".into()))?;

  let user = state
    .store
    .find_user_by_email(&link.email)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(Redeemed {
    email:   link.email,
    user_id: user.map(|u| u.user_id),
  }))
}
