//! Error types for `solace-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("session not found")]
  SessionNotFound,

  #[error("session expired")]
  SessionExpired,

  #[error("session {0} is already converted")]
  AlreadyConverted(Uuid),

  #[error("malformed email address: {0:?}")]
  InvalidEmail(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
