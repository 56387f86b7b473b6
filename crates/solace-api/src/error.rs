//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Not-found and expired sessions are distinct kinds so the client knows to
//! recreate the session rather than retry. Store failures surface as a
//! generic transient error; the detail goes to the log, not the client.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("session expired")]
  SessionExpired,

  #[error("session already converted")]
  AlreadyConverted,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("unauthorized")]
  Unauthorized,

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Wrap a backend error for the response path.
  pub fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }
}

impl From<solace_core::Error> for ApiError {
  fn from(e: solace_core::Error) -> Self {
    use solace_core::Error as Core;
    match e {
      Core::SessionNotFound     => ApiError::NotFound("session not found".into()),
      Core::SessionExpired      => ApiError::SessionExpired,
      Core::AlreadyConverted(_) => ApiError::AlreadyConverted,
      Core::InvalidEmail(email) => {
        ApiError::BadRequest(format!("malformed email address: {email}"))
      }
      Core::Serialization(err)  => ApiError::Store(Box::new(err)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::SessionExpired => (
        StatusCode::GONE,
        "session expired; create a new session".to_string(),
      ),
      ApiError::AlreadyConverted => (
        StatusCode::CONFLICT,
        "session already converted".to_string(),
      ),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Unauthorized => {
        let mut res = (
          StatusCode::UNAUTHORIZED,
          Json(json!({ "error": "unauthorized" })),
        )
          .into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"solace\""),
        );
        return res;
      }
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (
          StatusCode::SERVICE_UNAVAILABLE,
          "temporary problem, please try again".to_string(),
        )
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
