//! The `WellnessStore` trait and supporting account types.
//!
//! The trait is implemented by storage backends (e.g. `solace-store-sqlite`).
//! The HTTP layer depends on this abstraction, not on any concrete backend,
//! so tests can substitute fakes.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{crisis::CrisisAlert, session::Session};

// ─── Account types ───────────────────────────────────────────────────────────

/// Input for account creation during conversion.
#[derive(Debug, Clone)]
pub struct NewUser {
  pub email: String,
  pub name:  Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub user_id:    Uuid,
  pub email:      String,
  pub name:       Option<String>,
  pub created_at: DateTime<Utc>,
}

/// Coaching workspace created alongside a new user at conversion time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientProfile {
  pub client_id:         Uuid,
  pub user_id:           Uuid,
  /// Primary goal carried over from the session's extracted profile.
  pub goals:             Option<String>,
  /// The anonymous session this profile was imported from.
  pub source_session_id: Option<Uuid>,
  pub folder_path:       String,
  pub created_at:        DateTime<Utc>,
}

/// Single-use, short-lived token for passwordless login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagicLink {
  pub token:      String,
  pub email:      String,
  pub expires_at: DateTime<Utc>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the platform's persistence backend.
///
/// A session row's per-turn update must be all-or-nothing: `save_session`
/// writes the transcript and every derived field in a single atomic write so
/// a crash mid-turn never leaves `message_count` inconsistent with the
/// transcript.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait WellnessStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Sessions ──────────────────────────────────────────────────────────

  /// Persist a freshly issued session.
  fn insert_session<'a>(
    &'a self,
    session: &'a Session,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Look a session up by its opaque token. Returns `None` if not found.
  fn get_session<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + 'a;

  /// Write back a mutated session — transcript plus all derived fields — as
  /// one atomic single-row update.
  fn save_session<'a>(
    &'a self,
    session: &'a Session,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Set the conversion fields iff the session has not been converted yet.
  /// Returns `false` when another call already converted it.
  fn mark_session_converted(
    &self,
    session_id: Uuid,
    user_id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Garbage-collect sessions past `expires_at` that were never converted.
  /// Converted sessions are exempt regardless of expiry. Returns the number
  /// of sessions deleted.
  fn delete_expired_unconverted(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Accounts ──────────────────────────────────────────────────────────

  fn find_user_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// Create a user together with their client profile in one transaction.
  fn create_account(
    &self,
    user: NewUser,
    goals: Option<String>,
    source_session_id: Option<Uuid>,
  ) -> impl Future<Output = Result<(User, ClientProfile), Self::Error>> + Send + '_;

  // ── Magic links ───────────────────────────────────────────────────────

  fn insert_magic_link<'a>(
    &'a self,
    link: &'a MagicLink,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Redeem a magic link: marks it used and returns it, or `None` when the
  /// token is unknown, expired, or already used. Single-use is enforced by
  /// the store, not the caller.
  fn consume_magic_link<'a>(
    &'a self,
    token: &'a str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<MagicLink>, Self::Error>> + Send + 'a;

  // ── Crisis alerts ─────────────────────────────────────────────────────

  /// Append to the crisis audit trail. Alerts are never deleted.
  fn record_crisis_alert<'a>(
    &'a self,
    session_id: Uuid,
    user_id: Option<Uuid>,
    alert: &'a CrisisAlert,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
