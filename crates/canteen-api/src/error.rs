//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use canteen_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Shown to clients for any storage failure; details stay in the logs.
pub const RETRY_MESSAGE: &str =
  "The service is temporarily unavailable. Please try again.";

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Core(#[from] CoreError),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Core(e) => match e {
        CoreError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        CoreError::AggregationConflict(_) => StatusCode::CONFLICT,
        CoreError::InvalidPeriodLabel(_)
        | CoreError::DateOutOfRange(_)
        | CoreError::InvalidTariff(_) => StatusCode::BAD_REQUEST,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = match &self {
      ApiError::Core(e @ (CoreError::StorageUnavailable(_) | CoreError::Storage(_))) => {
        error!(error = %e, "request failed on storage");
        RETRY_MESSAGE.to_owned()
      }
      other => other.to_string(),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
