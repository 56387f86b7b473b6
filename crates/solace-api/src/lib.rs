//! JSON HTTP layer for the Solace coaching pipeline.
//!
//! Exposes an axum [`Router`] backed by any [`WellnessStore`] and any
//! [`CompletionClient`]. The coaching endpoints are anonymous; the session
//! token is the only credential. Maintenance endpoints require HTTP Basic
//! auth.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = solace_api::router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod convert;
pub mod error;
pub mod extract;
pub mod locks;
pub mod maintenance;
pub mod messages;
pub mod pipeline;
pub mod reply;
pub mod sessions;
pub mod token;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use serde::Deserialize;
use solace_core::{llm::CompletionClient, store::WellnessStore};

use auth::AuthConfig;
use locks::SessionLocks;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  /// Public origin used to build magic-link URLs, no trailing slash.
  pub base_url:           String,
  pub store_path:         PathBuf,
  pub auth_username:      String,
  pub auth_password_hash: String,
  pub llm_base_url:       String,
  pub llm_api_key:        String,
  pub llm_model:          String,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, C> {
  pub store:  Arc<S>,
  pub llm:    Arc<C>,
  pub config: Arc<ServerConfig>,
  pub auth:   Arc<AuthConfig>,
  pub locks:  SessionLocks,
}

// Manual impl so `S` and `C` need not be `Clone` themselves.
impl<S, C> Clone for AppState<S, C> {
  fn clone(&self) -> Self {
    Self {
      store:  self.store.clone(),
      llm:    self.llm.clone(),
      config: self.config.clone(),
      auth:   self.auth.clone(),
      locks:  self.locks.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S, C>(state: AppState<S, C>) -> Router
where
  S: WellnessStore + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
  C: CompletionClient + 'static,
{
  Router::new()
    // Sessions
    .route("/api/sessions", post(sessions::create::<S, C>))
    .route("/api/sessions/{token}", get(sessions::get_one::<S, C>))
    .route("/api/sessions/{token}/messages", post(messages::send::<S, C>))
    .route("/api/sessions/{token}/convert", post(convert::convert::<S, C>))
    // Auth
    .route("/api/auth/magic", get(convert::redeem_magic::<S, C>))
    // Maintenance
    .route("/api/maintenance/cleanup", post(maintenance::cleanup::<S, C>))
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use std::sync::atomic::{AtomicUsize, Ordering};

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use chrono::{Duration, Utc};
  use rand_core::OsRng;
  use serde_json::{Value, json};
  use solace_core::llm::{CompletionError, CompletionRequest, ResponseMode};
  use solace_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  // ── Scripted model ────────────────────────────────────────────────────────

  /// Deterministic stand-in for the model: fixed reply text, fixed
  /// extraction JSON, switchable failure modes.
  struct ScriptedLlm {
    reply:          String,
    extraction:     String,
    fail_all:       bool,
    fail_json:      bool,
    calls:          AtomicUsize,
    json_calls:     AtomicUsize,
  }

  impl Default for ScriptedLlm {
    fn default() -> Self {
      Self {
        reply:      "Thanks for sharing. Let's start with one small step."
          .to_string(),
        extraction: r#"{"firstName":"Dana","primaryGoal":"sleep better"}"#
          .to_string(),
        fail_all:   false,
        fail_json:  false,
        calls:      AtomicUsize::new(0),
        json_calls: AtomicUsize::new(0),
      }
    }
  }

  impl CompletionClient for ScriptedLlm {
    async fn complete(
      &self,
      request: CompletionRequest,
    ) -> Result<String, CompletionError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if self.fail_all {
        return Err(CompletionError::Transport("scripted outage".into()));
      }
      match request.mode {
        ResponseMode::StrictJson => {
          self.json_calls.fetch_add(1, Ordering::SeqCst);
          if self.fail_json {
            Err(CompletionError::Malformed("scripted bad json".into()))
          } else {
            Ok(self.extraction.clone())
          }
        }
        ResponseMode::Text => Ok(self.reply.clone()),
      }
    }
  }

  // ── Harness ───────────────────────────────────────────────────────────────

  type TestState = AppState<SqliteStore, ScriptedLlm>;

  async fn make_state(llm: ScriptedLlm) -> TestState {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let salt  = SaltString::generate(&mut OsRng);
    let hash  = Argon2::default()
      .hash_password(b"sweep-secret", &salt)
      .unwrap()
      .to_string();

    AppState {
      store: Arc::new(store),
      llm:   Arc::new(llm),
      config: Arc::new(ServerConfig {
        host:               "127.0.0.1".to_string(),
        port:               8080,
        base_url:           "http://localhost:8080".to_string(),
        store_path:         PathBuf::from(":memory:"),
        auth_username:      "ops".to_string(),
        auth_password_hash: hash.clone(),
        llm_base_url:       "http://unused".to_string(),
        llm_api_key:        "unused".to_string(),
        llm_model:          "unused".to_string(),
      }),
      auth: Arc::new(AuthConfig {
        username:      "ops".to_string(),
        password_hash: hash,
      }),
      locks: SessionLocks::new(),
    }
  }

  async fn request(
    state:  TestState,
    method: &str,
    uri:    &str,
    body:   Option<Value>,
    basic:  Option<(&str, &str)>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    if let Some((user, pass)) = basic {
      let encoded = B64.encode(format!("{user}:{pass}"));
      builder = builder.header(header::AUTHORIZATION, format!("Basic {encoded}"));
    }
    let req = builder
      .body(Body::from(
        body.map(|b| b.to_string()).unwrap_or_default(),
      ))
      .unwrap();

    let resp   = router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes  = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
      .await
      .unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  async fn create_session(state: &TestState) -> String {
    let (status, body) =
      request(state.clone(), "POST", "/api/sessions", Some(json!({})), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    body["sessionToken"].as_str().unwrap().to_string()
  }

  async fn send_message(
    state: &TestState,
    token: &str,
    message: &str,
  ) -> (StatusCode, Value) {
    request(
      state.clone(),
      "POST",
      &format!("/api/sessions/{token}/messages"),
      Some(json!({ "message": message })),
      None,
    )
    .await
  }

  // ── Session lifecycle ─────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_session_returns_token_and_horizon() {
    let state = make_state(ScriptedLlm::default()).await;
    let (status, body) =
      request(state, "POST", "/api/sessions", Some(json!({})), None).await;
    assert_eq!(status, StatusCode::CREATED);

    let token = body["sessionToken"].as_str().unwrap();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(body["sessionId"].is_string());
    assert!(body["expiresAt"].is_string());
  }

  #[tokio::test]
  async fn unknown_token_is_404() {
    let state = make_state(ScriptedLlm::default()).await;
    let (status, _) = request(
      state,
      "GET",
      &format!("/api/sessions/{}", "0".repeat(64)),
      None,
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  /// Insert a session whose window has already closed. `save_session` never
  /// touches `expires_at`, so expiry has to be baked in at insert time.
  async fn insert_expired_session(state: &TestState) -> String {
    let issued_at = Utc::now() - Duration::days(8);
    let session = solace_core::session::Session::issue(
      crate::token::generate(),
      Default::default(),
      issued_at,
    );
    state.store.insert_session(&session).await.unwrap();
    session.token
  }

  #[tokio::test]
  async fn expired_session_is_410() {
    let state = make_state(ScriptedLlm::default()).await;
    let token = insert_expired_session(&state).await;

    let (status, _) = send_message(&state, &token, "hello again").await;
    assert_eq!(status, StatusCode::GONE);

    let (status, _) = request(
      state,
      "GET",
      &format!("/api/sessions/{token}"),
      None,
      None,
    )
    .await;
    assert_eq!(status, StatusCode::GONE);
  }

  // ── Message turns ─────────────────────────────────────────────────────────

  #[tokio::test]
  async fn normal_turn_replies_and_persists_both_messages() {
    let state = make_state(ScriptedLlm::default()).await;
    let token = create_session(&state).await;

    let (status, body) =
      send_message(&state, &token, "I can't get my toddler to sleep").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["safetyBlocked"], json!(false));
    assert_eq!(body["crisisDetected"], json!(false));
    assert!(body["message"].as_str().unwrap().contains("one small step"));
    assert_eq!(body["extractedData"]["firstName"], json!("Dana"));

    let session = state.store.get_session(&token).await.unwrap().unwrap();
    assert_eq!(session.transcript.len(), 2);
    assert_eq!(session.message_count, 1);
    assert_eq!(session.extracted.first_name.as_deref(), Some("Dana"));
  }

  #[tokio::test]
  async fn empty_and_oversized_messages_are_rejected() {
    let state = make_state(ScriptedLlm::default()).await;
    let token = create_session(&state).await;

    let (status, _) = send_message(&state, &token, "   ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let oversized = "x".repeat(5001);
    let (status, _) = send_message(&state, &token, &oversized).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing was appended.
    let session = state.store.get_session(&token).await.unwrap().unwrap();
    assert!(session.transcript.is_empty());
  }

  #[tokio::test]
  async fn safety_screen_short_circuits_the_model() {
    let state = make_state(ScriptedLlm::default()).await;
    let token = create_session(&state).await;

    let (status, body) =
      send_message(&state, &token, "Can you give me medical advice?").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["safetyBlocked"], json!(true));
    assert!(body["message"].as_str().unwrap().contains("medical professional"));

    // No model call happened, but the exchange is still on the transcript.
    assert_eq!(state.llm.calls.load(Ordering::SeqCst), 0);
    let session = state.store.get_session(&token).await.unwrap().unwrap();
    assert_eq!(session.transcript.len(), 2);
  }

  #[tokio::test]
  async fn crisis_turn_returns_resources_and_records_alert() {
    let state = make_state(ScriptedLlm::default()).await;
    let token = create_session(&state).await;

    let (status, body) =
      send_message(&state, &token, "I just want to end my life").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["crisisDetected"], json!(true));
    assert!(body["message"].as_str().unwrap().contains("988"));
    assert_eq!(state.llm.calls.load(Ordering::SeqCst), 0);

    let session = state.store.get_session(&token).await.unwrap().unwrap();
    assert_eq!(
      state.store.crisis_alert_count(session.session_id).await.unwrap(),
      1
    );
  }

  #[tokio::test]
  async fn failed_extraction_keeps_previous_profile_and_still_replies() {
    let state = make_state(ScriptedLlm::default()).await;
    let token = create_session(&state).await;
    send_message(&state, &token, "My name is Dana").await;

    // Break extraction only; the reply path still works.
    let state2 = TestState {
      llm: Arc::new(ScriptedLlm { fail_json: true, ..ScriptedLlm::default() }),
      ..state.clone()
    };
    let (status, body) =
      send_message(&state2, &token, "Anyway, about bedtime routines").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("one small step"));

    let session = state.store.get_session(&token).await.unwrap().unwrap();
    assert_eq!(session.extracted.first_name.as_deref(), Some("Dana"));
  }

  #[tokio::test]
  async fn empty_extraction_keeps_previous_profile() {
    let state = make_state(ScriptedLlm::default()).await;
    let token = create_session(&state).await;
    send_message(&state, &token, "My name is Dana").await;

    let state2 = TestState {
      llm: Arc::new(ScriptedLlm {
        extraction: "{}".to_string(),
        ..ScriptedLlm::default()
      }),
      ..state.clone()
    };
    send_message(&state2, &token, "How was your day?").await;

    let session = state.store.get_session(&token).await.unwrap().unwrap();
    assert_eq!(session.extracted.first_name.as_deref(), Some("Dana"));
  }

  #[tokio::test]
  async fn model_outage_degrades_to_fallback_reply() {
    let state = make_state(ScriptedLlm {
      fail_all: true,
      ..ScriptedLlm::default()
    })
    .await;
    let token = create_session(&state).await;

    let (status, body) = send_message(&state, &token, "hello there").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!(crate::reply::FALLBACK_REPLY));

    // Turn was persisted despite the outage.
    let session = state.store.get_session(&token).await.unwrap().unwrap();
    assert_eq!(session.transcript.len(), 2);
  }

  // ── Conversion gate ───────────────────────────────────────────────────────

  #[tokio::test]
  async fn conversion_prompt_fires_after_ten_engaged_messages() {
    let state = make_state(ScriptedLlm {
      // Long replies push value-delivered over the bar quickly.
      reply: "Here is a concrete plan. ".repeat(12),
      ..ScriptedLlm::default()
    })
    .await;
    let token = create_session(&state).await;

    let mut prompted_at = None;
    for n in 1..=10 {
      let (_, body) = send_message(&state, &token, "tell me more please").await;
      if body["shouldShowConversionPrompt"] == json!(true) && prompted_at.is_none() {
        prompted_at = Some(n);
      }
    }
    // Score by message 10: 50 (messages) + 20 (value) = 70 ≥ 61, and the
    // message threshold for that band is 10.
    assert_eq!(prompted_at, Some(10));

    let session = state.store.get_session(&token).await.unwrap().unwrap();
    assert!(session.conversion_prompt_shown);
    assert_eq!(session.conversion_prompt_count, 1);
  }

  #[tokio::test]
  async fn prompt_count_never_exceeds_three() {
    let state = make_state(ScriptedLlm {
      reply: "Here is a concrete plan. ".repeat(12),
      ..ScriptedLlm::default()
    })
    .await;
    let token = create_session(&state).await;

    for _ in 0..25 {
      send_message(&state, &token, "still thinking about it").await;
    }
    let session = state.store.get_session(&token).await.unwrap().unwrap();
    assert!(session.conversion_prompt_count <= 3);
  }

  // ── Conversion ────────────────────────────────────────────────────────────

  async fn convert(
    state: &TestState,
    token: &str,
    email: &str,
  ) -> (StatusCode, Value) {
    request(
      state.clone(),
      "POST",
      &format!("/api/sessions/{token}/convert"),
      Some(json!({ "email": email })),
      None,
    )
    .await
  }

  #[tokio::test]
  async fn convert_creates_account_and_magic_link() {
    let state = make_state(ScriptedLlm::default()).await;
    let token = create_session(&state).await;
    send_message(&state, &token, "My name is Dana, I want to sleep better")
      .await;

    let (status, body) = convert(&state, &token, "Dana@Example.com").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["userId"].is_string());
    assert!(body["clientId"].is_string());

    let url = body["magicLinkUrl"].as_str().unwrap();
    assert!(url.starts_with("http://localhost:8080/api/auth/magic?token="));

    // Email was normalised; goals carried over from extraction.
    let user = state
      .store
      .find_user_by_email("dana@example.com")
      .await
      .unwrap()
      .unwrap();
    assert_eq!(user.email, "dana@example.com");

    let session = state.store.get_session(&token).await.unwrap().unwrap();
    assert_eq!(session.converted_to_user_id, Some(user.user_id));
  }

  #[tokio::test]
  async fn convert_rejects_malformed_email() {
    let state = make_state(ScriptedLlm::default()).await;
    let token = create_session(&state).await;
    let (status, _) = convert(&state, &token, "not-an-email").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn second_convert_is_conflict() {
    let state = make_state(ScriptedLlm::default()).await;
    let token = create_session(&state).await;

    let (first, _) = convert(&state, &token, "dana@example.com").await;
    assert_eq!(first, StatusCode::OK);
    let (second, _) = convert(&state, &token, "other@example.com").await;
    assert_eq!(second, StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn convert_reuses_existing_account() {
    let state = make_state(ScriptedLlm::default()).await;

    let t1 = create_session(&state).await;
    let (_, first) = convert(&state, &t1, "dana@example.com").await;

    let t2 = create_session(&state).await;
    let (status, second) = convert(&state, &t2, "dana@example.com").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["userId"], first["userId"]);
    // No new client profile for an existing account.
    assert!(second.get("clientId").is_none());
  }

  #[tokio::test]
  async fn converted_session_still_accepts_messages() {
    let state = make_state(ScriptedLlm::default()).await;
    let token = create_session(&state).await;
    convert(&state, &token, "dana@example.com").await;

    let (status, body) = send_message(&state, &token, "one more question").await;
    assert_eq!(status, StatusCode::OK);
    // A converted session is never asked to convert again.
    assert_eq!(body["shouldShowConversionPrompt"], json!(false));
  }

  // ── Magic links ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn magic_link_redeems_once() {
    let state = make_state(ScriptedLlm::default()).await;
    let token = create_session(&state).await;
    let (_, body) = convert(&state, &token, "dana@example.com").await;

    let url = body["magicLinkUrl"].as_str().unwrap();
    let path = url.strip_prefix("http://localhost:8080").unwrap().to_string();

    let (status, redeemed) =
      request(state.clone(), "GET", &path, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(redeemed["email"], json!("dana@example.com"));
    assert_eq!(redeemed["userId"], body["userId"]);

    let (again, _) = request(state, "GET", &path, None, None).await;
    assert_eq!(again, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn unknown_magic_token_is_404() {
    let state = make_state(ScriptedLlm::default()).await;
    let (status, _) = request(
      state,
      "GET",
      &format!("/api/auth/magic?token={}", "f".repeat(64)),
      None,
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Maintenance ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn cleanup_requires_auth() {
    let state = make_state(ScriptedLlm::default()).await;
    let (status, _) = request(
      state.clone(),
      "POST",
      "/api/maintenance/cleanup",
      None,
      None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = request(
      state,
      "POST",
      "/api/maintenance/cleanup",
      None,
      Some(("ops", "wrong")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn cleanup_sweeps_expired_but_spares_converted() {
    let state = make_state(ScriptedLlm::default()).await;

    // One expired-unconverted, one expired-converted, one live.
    let doomed    = insert_expired_session(&state).await;
    let converted = insert_expired_session(&state).await;
    let live      = create_session(&state).await;

    let converted_session =
      state.store.get_session(&converted).await.unwrap().unwrap();
    let won = state
      .store
      .mark_session_converted(
        converted_session.session_id,
        uuid::Uuid::new_v4(),
        Utc::now(),
      )
      .await
      .unwrap();
    assert!(won);

    let (status, body) = request(
      state.clone(),
      "POST",
      "/api/maintenance/cleanup",
      None,
      Some(("ops", "sweep-secret")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deletedCount"], json!(1));

    assert!(state.store.get_session(&doomed).await.unwrap().is_none());
    assert!(state.store.get_session(&converted).await.unwrap().is_some());
    assert!(state.store.get_session(&live).await.unwrap().is_some());
  }
}
