//! Session — the aggregate for one anonymous coaching conversation.
//!
//! A session is created on first contact, mutated every turn by the
//! pipeline, and terminated either by expiry (swept, if never converted) or
//! by conversion to an account (terminal; transcript retained).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  message::{ChatMessage, Role},
  profile::ExtractedProfile,
};

/// Sessions live for a fixed seven days from creation; `expires_at` is never
/// extended.
pub const SESSION_TTL_DAYS: i64 = 7;

/// Request metadata captured at session creation, for analytics only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
  pub ip_address: Option<String>,
  pub user_agent: Option<String>,
  pub referrer:   Option<String>,
}

/// Lifecycle state, computed from `expires_at` and the conversion fields
/// rather than stored denormalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
  Active,
  Expired,
  Converted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
  pub session_id:               Uuid,
  /// Opaque lookup token handed to the client; 32 bytes of CSPRNG entropy,
  /// hex encoded. Generated by the caller, never by this crate.
  pub token:                    String,
  pub created_at:               DateTime<Utc>,
  pub expires_at:               DateTime<Utc>,
  pub last_active_at:           DateTime<Utc>,
  pub metadata:                 SessionMetadata,
  pub transcript:               Vec<ChatMessage>,
  /// Replaced wholesale by each successful extraction; a failed extraction
  /// leaves the previous value in place.
  pub extracted:                ExtractedProfile,
  pub engagement_score:         u8,
  /// Count of user-authored turns only. Maintained by the push methods so it
  /// always equals the number of `Role::User` entries in `transcript`.
  pub message_count:            u32,
  /// `now - created_at` as of the last turn; recomputed, not accumulated.
  pub session_duration_seconds: i64,
  pub value_delivered:          bool,
  /// Sticky: once true, stays true.
  pub conversion_prompt_shown:  bool,
  pub conversion_prompt_count:  u32,
  pub converted_to_user_id:     Option<Uuid>,
  pub converted_at:             Option<DateTime<Utc>>,
}

impl Session {
  /// Build a fresh session around a caller-generated token.
  pub fn issue(token: String, metadata: SessionMetadata, now: DateTime<Utc>) -> Self {
    Self {
      session_id: Uuid::new_v4(),
      token,
      created_at: now,
      expires_at: now + Duration::days(SESSION_TTL_DAYS),
      last_active_at: now,
      metadata,
      transcript: Vec::new(),
      extracted: ExtractedProfile::default(),
      engagement_score: 0,
      message_count: 0,
      session_duration_seconds: 0,
      value_delivered: false,
      conversion_prompt_shown: false,
      conversion_prompt_count: 0,
      converted_to_user_id: None,
      converted_at: None,
    }
  }

  pub fn status(&self, now: DateTime<Utc>) -> SessionStatus {
    if self.converted_to_user_id.is_some() {
      SessionStatus::Converted
    } else if now > self.expires_at {
      SessionStatus::Expired
    } else {
      SessionStatus::Active
    }
  }

  pub fn is_converted(&self) -> bool { self.converted_to_user_id.is_some() }

  /// Reject operations on an expired, unconverted session.
  pub fn ensure_active(&self, now: DateTime<Utc>) -> Result<()> {
    match self.status(now) {
      SessionStatus::Expired => Err(Error::SessionExpired),
      _ => Ok(()),
    }
  }

  /// Append a user turn and restore the message-count invariant.
  pub fn push_user(&mut self, content: impl Into<String>) {
    self.transcript.push(ChatMessage::user(content));
    self.message_count = self.user_turns();
  }

  /// Append an assistant turn.
  pub fn push_assistant(&mut self, content: impl Into<String>) {
    self.transcript.push(ChatMessage::assistant(content));
  }

  fn user_turns(&self) -> u32 {
    self.transcript.iter().filter(|m| m.role == Role::User).count() as u32
  }

  pub fn duration_seconds(&self, now: DateTime<Utc>) -> i64 {
    (now - self.created_at).num_seconds().max(0)
  }

  pub fn touch(&mut self, now: DateTime<Utc>) { self.last_active_at = now; }

  /// Record the conversion gate firing this turn.
  pub fn record_conversion_prompt(&mut self) {
    self.conversion_prompt_shown = true;
    self.conversion_prompt_count += 1;
  }

  /// Enter the terminal converted state. Fails if already converted;
  /// conversion happens exactly once.
  pub fn mark_converted(&mut self, user_id: Uuid, now: DateTime<Utc>) -> Result<()> {
    if self.is_converted() {
      return Err(Error::AlreadyConverted(self.session_id));
    }
    self.converted_to_user_id = Some(user_id);
    self.converted_at = Some(now);
    Ok(())
  }
}

/// Minimal structural email check for the conversion flow. Deliverability is
/// the magic-link email's problem.
pub fn validate_email(email: &str) -> Result<()> {
  let ok = match email.split_once('@') {
    Some((local, domain)) => {
      !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
    }
    None => false,
  };
  if ok { Ok(()) } else { Err(Error::InvalidEmail(email.to_string())) }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn session(now: DateTime<Utc>) -> Session {
    Session::issue("a".repeat(64), SessionMetadata::default(), now)
  }

  #[test]
  fn expiry_horizon_is_seven_days() {
    let now = Utc::now();
    let s = session(now);
    assert_eq!(s.expires_at - s.created_at, Duration::days(7));
  }

  #[test]
  fn message_count_tracks_user_turns_only() {
    let mut s = session(Utc::now());
    s.push_user("hello");
    s.push_assistant("hi there");
    s.push_user("I need help with sleep");
    assert_eq!(s.message_count, 2);
    assert_eq!(s.transcript.len(), 3);
  }

  #[test]
  fn expired_session_rejects_operations() {
    let now = Utc::now();
    let s = session(now - Duration::days(8));
    assert_eq!(s.status(now), SessionStatus::Expired);
    assert!(matches!(s.ensure_active(now), Err(Error::SessionExpired)));
  }

  #[test]
  fn converted_session_is_terminal_even_past_expiry() {
    let now = Utc::now();
    let mut s = session(now - Duration::days(8));
    s.mark_converted(Uuid::new_v4(), now - Duration::days(8)).unwrap();
    assert_eq!(s.status(now), SessionStatus::Converted);
    // Converted sessions are not rejected as expired.
    assert!(s.ensure_active(now).is_ok());
  }

  #[test]
  fn conversion_happens_exactly_once() {
    let now = Utc::now();
    let mut s = session(now);
    let user = Uuid::new_v4();
    s.mark_converted(user, now).unwrap();
    let err = s.mark_converted(Uuid::new_v4(), now).unwrap_err();
    assert!(matches!(err, Error::AlreadyConverted(_)));
    assert_eq!(s.converted_to_user_id, Some(user));
  }

  #[test]
  fn email_validation() {
    assert!(validate_email("dana@example.com").is_ok());
    assert!(validate_email("a@b.co").is_ok());
    assert!(validate_email("not-an-email").is_err());
    assert!(validate_email("@example.com").is_err());
    assert!(validate_email("dana@nodot").is_err());
    assert!(validate_email("dana@.com").is_err());
    assert!(validate_email("da na@example.com").is_err());
  }
}
