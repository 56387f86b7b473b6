//! The per-turn pipeline: safety screen, crisis detection, profile
//! extraction, engagement scoring, the conversion gate, and the coaching
//! reply, in that order.
//!
//! Exactly one `save_session` happens per turn, after every stage has run,
//! so a session row never persists a partially applied turn.

use chrono::Utc;
use serde::Serialize;
use solace_core::{
  crisis, engagement, llm::CompletionClient, profile::ExtractedProfile,
  safety, session::Session, store::WellnessStore,
};

use crate::{AppState, error::ApiError, extract, reply};

/// What one message turn produced, shaped for the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnReply {
  pub message:          String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub engagement_score: Option<u8>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub should_show_conversion_prompt: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub extracted_data:   Option<ExtractedProfile>,
  pub safety_blocked:   bool,
  pub crisis_detected:  bool,
}

/// Run one full turn for the session identified by `token`.
///
/// The token-keyed lock serialises turns for one session; turns on other
/// sessions proceed concurrently.
pub async fn run_turn<S, C>(
  state:   &AppState<S, C>,
  token:   &str,
  content: &str,
) -> Result<TurnReply, ApiError>
where
  S: WellnessStore,
  C: CompletionClient,
{
  let _guard = state.locks.acquire(token).await;

  let now = Utc::now();
  let mut session = state
    .store
    .get_session(token)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("session not found".into()))?;
  session.ensure_active(now)?;

  // Safety screen: out-of-scope requests get a canned redirect and the
  // exchange is still recorded as part of the transcript.
  if let Some(block) = safety::screen(content) {
    tracing::info!(
      session_id = %session.session_id,
      category = ?block.category,
      "safety screen matched",
    );
    session.push_user(content);
    session.push_assistant(block.redirect);
    rescore(&mut session);
    session.touch(now);
    state.store.save_session(&session).await.map_err(ApiError::store)?;
    return Ok(TurnReply {
      message:          block.redirect.to_string(),
      engagement_score: None,
      should_show_conversion_prompt: None,
      extracted_data:   None,
      safety_blocked:   true,
      crisis_detected:  false,
    });
  }

  // Crisis detection: supportive resources instead of a model reply, and an
  // audit record regardless of how the rest of the turn goes.
  if let Some(alert) = crisis::detect(content) {
    tracing::warn!(
      session_id = %session.session_id,
      category = alert.category.as_str(),
      risk_score = alert.risk_score,
      "crisis indicators detected",
    );
    state
      .store
      .record_crisis_alert(session.session_id, session.converted_to_user_id, &alert)
      .await
      .map_err(ApiError::store)?;

    let response = crisis::crisis_response(alert.category);
    session.push_user(content);
    session.push_assistant(&response);
    rescore(&mut session);
    session.touch(now);
    state.store.save_session(&session).await.map_err(ApiError::store)?;
    return Ok(TurnReply {
      message:          response,
      engagement_score: None,
      should_show_conversion_prompt: None,
      extracted_data:   None,
      safety_blocked:   false,
      crisis_detected:  true,
    });
  }

  session.push_user(content);

  // Re-extract from the whole transcript. A failed extraction keeps the
  // previous snapshot, and so does an empty one — a model that found
  // nothing this turn must not wipe fields found earlier.
  if let Some(profile) = extract::extract_profile(&*state.llm, &session.transcript).await
    && !profile.is_empty()
  {
    session.extracted = profile;
  }

  rescore(&mut session);

  let prompt_conversion = !session.is_converted()
    && engagement::should_prompt_conversion(
      session.engagement_score,
      session.message_count,
      session.session_duration_seconds,
      session.conversion_prompt_count,
    );

  let message = reply::generate_reply(
    &*state.llm,
    &session.transcript,
    &session.extracted,
    prompt_conversion,
  )
  .await;

  session.push_assistant(&message);
  if prompt_conversion {
    session.record_conversion_prompt();
  }

  // The reply may itself have crossed the value-delivered bar; score once
  // more so the persisted and reported numbers agree.
  rescore(&mut session);

  session.touch(now);
  state.store.save_session(&session).await.map_err(ApiError::store)?;

  Ok(TurnReply {
    message,
    engagement_score: Some(session.engagement_score),
    should_show_conversion_prompt: Some(prompt_conversion),
    extracted_data: if session.extracted.is_empty() {
      None
    } else {
      Some(session.extracted.clone())
    },
    safety_blocked:  false,
    crisis_detected: false,
  })
}

/// Recompute the derived engagement fields from the current transcript and
/// session age.
fn rescore(session: &mut Session) {
  let now = Utc::now();
  session.session_duration_seconds = session.duration_seconds(now);
  session.value_delivered = engagement::value_delivered(&session.transcript);
  session.engagement_score = engagement::engagement_score(
    session.message_count,
    session.session_duration_seconds,
    session.value_delivered,
  );
}
