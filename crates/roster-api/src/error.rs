//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};
use roster_core::revision::RevisionError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("too many updates; retry in {retry_after} seconds")]
  Throttled { retry_after: u64 },

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    ApiError::Store(Box::new(e))
  }
}

impl From<roster_core::Error> for ApiError {
  fn from(e: roster_core::Error) -> Self { ApiError::BadRequest(e.to_string()) }
}

impl<E: std::error::Error + Send + Sync + 'static> From<RevisionError<E>> for ApiError {
  fn from(e: RevisionError<E>) -> Self {
    match e {
      RevisionError::Conflict(id) => {
        ApiError::Conflict(format!("person {id} was modified concurrently"))
      }
      RevisionError::Store(inner) => ApiError::store(inner),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let message = self.to_string();
    match self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, Json(json!({ "error": m }))).into_response(),
      ApiError::BadRequest(m) => {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": m }))).into_response()
      }
      ApiError::Throttled { retry_after } => (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, retry_after.to_string())],
        Json(json!({ "error": message, "retryAfter": retry_after })),
      )
        .into_response(),
      ApiError::Conflict(m) => {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": m }))).into_response()
      }
      ApiError::Store(e) => {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() })))
          .into_response()
      }
    }
  }
}
