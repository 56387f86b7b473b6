//! [`SqliteStore`] — the SQLite implementation of [`WellnessStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use solace_core::{
  crisis::CrisisAlert,
  session::Session,
  store::{ClientProfile, MagicLink, NewUser, User, WellnessStore},
};

use crate::{
  Error, Result,
  encode::{
    RawSession, encode_dt, encode_keywords, encode_profile, encode_transcript,
    encode_uuid,
  },
  schema::SCHEMA,
};

const SESSION_COLUMNS: &str = "session_id, session_token, created_at, \
   expires_at, last_active_at, ip_address, user_agent, referrer, \
   conversation_data, extracted_data, engagement_score, message_count, \
   session_duration_seconds, value_delivered, conversion_prompt_shown, \
   conversion_prompt_count, converted_to_user_id, converted_at";

fn raw_session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSession> {
  Ok(RawSession {
    session_id:               row.get(0)?,
    session_token:            row.get(1)?,
    created_at:               row.get(2)?,
    expires_at:               row.get(3)?,
    last_active_at:           row.get(4)?,
    ip_address:               row.get(5)?,
    user_agent:               row.get(6)?,
    referrer:                 row.get(7)?,
    conversation_data:        row.get(8)?,
    extracted_data:           row.get(9)?,
    engagement_score:         row.get(10)?,
    message_count:            row.get(11)?,
    session_duration_seconds: row.get(12)?,
    value_delivered:          row.get(13)?,
    conversion_prompt_shown:  row.get(14)?,
    conversion_prompt_count:  row.get(15)?,
    converted_to_user_id:     row.get(16)?,
    converted_at:             row.get(17)?,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Solace wellness store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── WellnessStore impl ──────────────────────────────────────────────────────

impl WellnessStore for SqliteStore {
  type Error = Error;

  // ── Sessions ──────────────────────────────────────────────────────────────

  async fn insert_session(&self, session: &Session) -> Result<()> {
    let id_str          = encode_uuid(session.session_id);
    let token           = session.token.clone();
    let created_str     = encode_dt(session.created_at);
    let expires_str     = encode_dt(session.expires_at);
    let active_str      = encode_dt(session.last_active_at);
    let ip_address      = session.metadata.ip_address.clone();
    let user_agent      = session.metadata.user_agent.clone();
    let referrer        = session.metadata.referrer.clone();
    let transcript_json = encode_transcript(&session.transcript)?;
    let extracted_json  = encode_profile(&session.extracted)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (
             session_id, session_token, created_at, expires_at, last_active_at,
             ip_address, user_agent, referrer,
             conversation_data, extracted_data
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          rusqlite::params![
            id_str,
            token,
            created_str,
            expires_str,
            active_str,
            ip_address,
            user_agent,
            referrer,
            transcript_json,
            extracted_json,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_session(&self, token: &str) -> Result<Option<Session>> {
    let token = token.to_owned();

    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE session_token = ?1"),
              rusqlite::params![token],
              raw_session_from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }

  async fn save_session(&self, session: &Session) -> Result<()> {
    let id_str          = encode_uuid(session.session_id);
    let active_str      = encode_dt(session.last_active_at);
    let transcript_json = encode_transcript(&session.transcript)?;
    let extracted_json  = encode_profile(&session.extracted)?;
    let score           = session.engagement_score as i64;
    let messages        = session.message_count as i64;
    let duration        = session.session_duration_seconds;
    let value           = session.value_delivered;
    let prompt_shown    = session.conversion_prompt_shown;
    let prompt_count    = session.conversion_prompt_count as i64;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE sessions SET
             last_active_at           = ?2,
             conversation_data        = ?3,
             extracted_data           = ?4,
             engagement_score         = ?5,
             message_count            = ?6,
             session_duration_seconds = ?7,
             value_delivered          = ?8,
             conversion_prompt_shown  = ?9,
             conversion_prompt_count  = ?10
           WHERE session_id = ?1",
          rusqlite::params![
            id_str,
            active_str,
            transcript_json,
            extracted_json,
            score,
            messages,
            duration,
            value,
            prompt_shown,
            prompt_count,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn mark_session_converted(
    &self,
    session_id: Uuid,
    user_id:    Uuid,
    at:         DateTime<Utc>,
  ) -> Result<bool> {
    let id_str      = encode_uuid(session_id);
    let user_id_str = encode_uuid(user_id);
    let at_str      = encode_dt(at);

    let changed = self
      .conn
      .call(move |conn| {
        // The IS NULL guard makes conversion first-write-wins.
        Ok(conn.execute(
          "UPDATE sessions SET converted_to_user_id = ?2, converted_at = ?3
           WHERE session_id = ?1 AND converted_to_user_id IS NULL",
          rusqlite::params![id_str, user_id_str, at_str],
        )?)
      })
      .await?;

    Ok(changed == 1)
  }

  async fn delete_expired_unconverted(&self, now: DateTime<Utc>) -> Result<u64> {
    let now_str = encode_dt(now);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM sessions
           WHERE expires_at < ?1 AND converted_to_user_id IS NULL",
          rusqlite::params![now_str],
        )?)
      })
      .await?;

    Ok(deleted as u64)
  }

  // ── Accounts ──────────────────────────────────────────────────────────────

  async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
    let email = email.to_owned();

    let raw: Option<(String, String, Option<String>, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, email, name, created_at FROM users WHERE email = ?1",
              rusqlite::params![email],
              |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?,
        )
      })
      .await?;

    match raw {
      None => Ok(None),
      Some((id, email, name, created)) => Ok(Some(User {
        user_id:    crate::encode::decode_uuid(&id)?,
        email,
        name,
        created_at: crate::encode::decode_dt(&created)?,
      })),
    }
  }

  async fn create_account(
    &self,
    user:              NewUser,
    goals:             Option<String>,
    source_session_id: Option<Uuid>,
  ) -> Result<(User, ClientProfile)> {
    let now = Utc::now();

    let created_user = User {
      user_id:    Uuid::new_v4(),
      email:      user.email,
      name:       user.name,
      created_at: now,
    };
    let client_id = Uuid::new_v4();
    let profile = ClientProfile {
      client_id,
      user_id: created_user.user_id,
      goals,
      source_session_id,
      folder_path: format!("/client-data/{}/", client_id.hyphenated()),
      created_at: now,
    };

    let user_id_str    = encode_uuid(created_user.user_id);
    let email          = created_user.email.clone();
    let name           = created_user.name.clone();
    let user_at_str    = encode_dt(created_user.created_at);
    let client_id_str  = encode_uuid(profile.client_id);
    let goals_val      = profile.goals.clone();
    let source_str     = profile.source_session_id.map(encode_uuid);
    let folder         = profile.folder_path.clone();
    let profile_at_str = encode_dt(profile.created_at);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO users (user_id, email, name, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![user_id_str, email, name, user_at_str],
        )?;
        tx.execute(
          "INSERT INTO client_profiles (
             client_id, user_id, goals, source_session_id, folder_path, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            client_id_str,
            user_id_str,
            goals_val,
            source_str,
            folder,
            profile_at_str,
          ],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok((created_user, profile))
  }

  // ── Magic links ───────────────────────────────────────────────────────────

  async fn insert_magic_link(&self, link: &MagicLink) -> Result<()> {
    let token       = link.token.clone();
    let email       = link.email.clone();
    let expires_str = encode_dt(link.expires_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO magic_links (token, email, expires_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![token, email, expires_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn consume_magic_link(
    &self,
    token: &str,
    now:   DateTime<Utc>,
  ) -> Result<Option<MagicLink>> {
    let token_owned = token.to_owned();
    let now_str     = encode_dt(now);

    let raw: Option<(String, String, String)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        // Marking used and reading back in one transaction keeps redemption
        // single-use under concurrent requests.
        let changed = tx.execute(
          "UPDATE magic_links SET used_at = ?2
           WHERE token = ?1 AND used_at IS NULL AND expires_at > ?2",
          rusqlite::params![token_owned, now_str],
        )?;

        let row = if changed == 1 {
          tx.query_row(
              "SELECT token, email, expires_at FROM magic_links WHERE token = ?1",
              rusqlite::params![token_owned],
              |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
        } else {
          None
        };
        tx.commit()?;
        Ok(row)
      })
      .await?;

    match raw {
      None => Ok(None),
      Some((token, email, expires)) => Ok(Some(MagicLink {
        token,
        email,
        expires_at: crate::encode::decode_dt(&expires)?,
      })),
    }
  }

  // ── Crisis alerts ─────────────────────────────────────────────────────────

  async fn record_crisis_alert(
    &self,
    session_id: Uuid,
    user_id:    Option<Uuid>,
    alert:      &CrisisAlert,
  ) -> Result<()> {
    let alert_id_str   = encode_uuid(Uuid::new_v4());
    let session_id_str = encode_uuid(session_id);
    let user_id_str    = user_id.map(encode_uuid);
    let category       = alert.category.as_str();
    let risk_score     = alert.risk_score as i64;
    let keywords_json  = encode_keywords(&alert.keywords)?;
    let context        = alert.context.clone();
    let detected_str   = encode_dt(alert.detected_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO crisis_alerts (
             alert_id, session_id, user_id, category, risk_score,
             keywords, context, detected_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            alert_id_str,
            session_id_str,
            user_id_str,
            category,
            risk_score,
            keywords_json,
            context,
            detected_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Introspection ───────────────────────────────────────────────────────────

impl SqliteStore {
  /// Count crisis alert rows recorded for a session.
  pub async fn crisis_alert_count(&self, session_id: Uuid) -> Result<i64> {
    let id_str = encode_uuid(session_id);
    let count = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM crisis_alerts WHERE session_id = ?1",
          rusqlite::params![id_str],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(count)
  }
}
