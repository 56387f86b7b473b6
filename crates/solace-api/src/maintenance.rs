//! Operator-only maintenance endpoints (HTTP Basic auth).

use axum::{Json, extract::State, http::HeaderMap};
use chrono::Utc;
use serde::Serialize;
use solace_core::{llm::CompletionClient, store::WellnessStore};

use crate::{AppState, auth::verify_auth, error::ApiError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResult {
  pub deleted_count: u64,
}

/// `POST /maintenance/cleanup` — sweep expired, never-converted sessions.
///
/// Converted sessions are retained regardless of expiry: their transcript is
/// the account's history.
pub async fn cleanup<S, C>(
  State(state): State<AppState<S, C>>,
  headers: HeaderMap,
) -> Result<Json<CleanupResult>, ApiError>
where
  S: WellnessStore,
  C: CompletionClient,
{
  verify_auth(&headers, &state.auth)?;

  let deleted_count = state
    .store
    .delete_expired_unconverted(Utc::now())
    .await
    .map_err(ApiError::store)?;

  tracing::info!(deleted_count, "expired session sweep complete");
  Ok(Json(CleanupResult { deleted_count }))
}
