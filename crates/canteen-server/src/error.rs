//! Error types and axum `IntoResponse` implementation.

use std::time::Duration;

use axum::{
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  #[error("invalid configuration: {0}")]
  Config(String),
  #[error("aggregation timed out after {0:?}")]
  TimedOut(Duration),
  #[error(transparent)]
  Core(#[from] canteen_core::Error),
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::Unauthorized => {
        let mut res = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"canteen\""),
        );
        res
      }
      other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response(),
    }
  }
}
