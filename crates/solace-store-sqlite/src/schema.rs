//! SQL schema for the Solace SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id    TEXT PRIMARY KEY,
    email      TEXT NOT NULL UNIQUE,
    name       TEXT,
    created_at TEXT NOT NULL
);

-- One row per anonymous coaching session. The whole turn state lives in
-- this row; every per-turn mutation is a single-row UPDATE.
CREATE TABLE IF NOT EXISTS sessions (
    session_id               TEXT PRIMARY KEY,
    session_token            TEXT NOT NULL UNIQUE,
    created_at               TEXT NOT NULL,   -- ISO 8601 UTC
    expires_at               TEXT NOT NULL,   -- fixed at creation, never extended
    last_active_at           TEXT NOT NULL,
    ip_address               TEXT,
    user_agent               TEXT,
    referrer                 TEXT,
    conversation_data        TEXT NOT NULL DEFAULT '[]',  -- JSON transcript
    extracted_data           TEXT NOT NULL DEFAULT '{}',  -- JSON, overwritten wholesale
    engagement_score         INTEGER NOT NULL DEFAULT 0,
    message_count            INTEGER NOT NULL DEFAULT 0,
    session_duration_seconds INTEGER NOT NULL DEFAULT 0,
    value_delivered          INTEGER NOT NULL DEFAULT 0,
    conversion_prompt_shown  INTEGER NOT NULL DEFAULT 0,
    conversion_prompt_count  INTEGER NOT NULL DEFAULT 0,
    converted_to_user_id     TEXT REFERENCES users(user_id),
    converted_at             TEXT
);

CREATE TABLE IF NOT EXISTS client_profiles (
    client_id         TEXT PRIMARY KEY,
    user_id           TEXT NOT NULL REFERENCES users(user_id),
    goals             TEXT,
    source_session_id TEXT,
    folder_path       TEXT NOT NULL,
    created_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS magic_links (
    token      TEXT PRIMARY KEY,
    email      TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    used_at    TEXT              -- set on first redemption; single use
);

-- Append-only audit trail. No UPDATE or DELETE is ever issued against
-- this table.
CREATE TABLE IF NOT EXISTS crisis_alerts (
    alert_id    TEXT PRIMARY KEY,
    session_id  TEXT NOT NULL,
    user_id     TEXT,
    category    TEXT NOT NULL,   -- 'suicide' | 'self-harm' | 'abuse' | 'violence' | 'substance'
    risk_score  INTEGER NOT NULL,
    keywords    TEXT NOT NULL,   -- JSON array of matched keywords
    context     TEXT NOT NULL,   -- first 200 chars of the triggering message
    detected_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS sessions_expires_idx      ON sessions(expires_at);
CREATE INDEX IF NOT EXISTS magic_links_email_idx     ON magic_links(email);
CREATE INDEX IF NOT EXISTS crisis_alerts_session_idx ON crisis_alerts(session_id);

PRAGMA user_version = 1;
";
