//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. The transcript and the
//! extracted profile are stored as compact JSON. UUIDs are stored as
//! hyphenated lowercase strings. Booleans are SQLite integers.

use chrono::{DateTime, Utc};
use solace_core::{
  message::ChatMessage,
  profile::ExtractedProfile,
  session::{Session, SessionMetadata},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── JSON columns ─────────────────────────────────────────────────────────────

pub fn encode_transcript(t: &[ChatMessage]) -> Result<String> {
  Ok(serde_json::to_string(t)?)
}

pub fn decode_transcript(s: &str) -> Result<Vec<ChatMessage>> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_profile(p: &ExtractedProfile) -> Result<String> {
  Ok(serde_json::to_string(p)?)
}

pub fn decode_profile(s: &str) -> Result<ExtractedProfile> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_keywords(k: &[String]) -> Result<String> {
  Ok(serde_json::to_string(k)?)
}

// ─── Raw row types ────────────────────────────────────────────────────────────

/// A `sessions` row as read from SQLite, before decoding.
pub struct RawSession {
  pub session_id:               String,
  pub session_token:            String,
  pub created_at:               String,
  pub expires_at:               String,
  pub last_active_at:           String,
  pub ip_address:               Option<String>,
  pub user_agent:               Option<String>,
  pub referrer:                 Option<String>,
  pub conversation_data:        String,
  pub extracted_data:           String,
  pub engagement_score:         i64,
  pub message_count:            i64,
  pub session_duration_seconds: i64,
  pub value_delivered:          bool,
  pub conversion_prompt_shown:  bool,
  pub conversion_prompt_count:  i64,
  pub converted_to_user_id:     Option<String>,
  pub converted_at:             Option<String>,
}

impl RawSession {
  pub fn into_session(self) -> Result<Session> {
    Ok(Session {
      session_id: decode_uuid(&self.session_id)?,
      token: self.session_token,
      created_at: decode_dt(&self.created_at)?,
      expires_at: decode_dt(&self.expires_at)?,
      last_active_at: decode_dt(&self.last_active_at)?,
      metadata: SessionMetadata {
        ip_address: self.ip_address,
        user_agent: self.user_agent,
        referrer:   self.referrer,
      },
      transcript: decode_transcript(&self.conversation_data)?,
      extracted: decode_profile(&self.extracted_data)?,
      engagement_score: self.engagement_score.clamp(0, 100) as u8,
      message_count: self.message_count.max(0) as u32,
      session_duration_seconds: self.session_duration_seconds,
      value_delivered: self.value_delivered,
      conversion_prompt_shown: self.conversion_prompt_shown,
      conversion_prompt_count: self.conversion_prompt_count.max(0) as u32,
      converted_to_user_id: self
        .converted_to_user_id
        .as_deref()
        .map(decode_uuid)
        .transpose()?,
      converted_at: self.converted_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}
